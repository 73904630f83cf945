//! Benchmarks for collection queries

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use doc_collections::{AddRequest, Client, CollectionOptions, QueryRequest, Settings};

fn create_random_embeddings(n: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|_| (0..dim).map(|_| rand::random::<f32>()).collect())
        .collect()
}

fn benchmark_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let client = Client::new(Settings::default()).unwrap();

    for size in [100, 1000, 10000].iter() {
        let collection = client
            .create_collection(&format!("bench{}", size), CollectionOptions::new())
            .unwrap();
        let ids: Vec<String> = (0..*size).map(|i| format!("v{}", i)).collect();
        collection
            .add(AddRequest::new(ids).embeddings(create_random_embeddings(*size, 128)))
            .unwrap();

        let query = vec![0.5f32; 128];

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                collection
                    .query(black_box(QueryRequest::embeddings([query.clone()]).n_results(10)))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_hashing_embedding(c: &mut Criterion) {
    use doc_collections::{EmbeddingFunction, HashingEmbedding};

    let function = HashingEmbedding::new(384).unwrap();
    let text = "The university chess club provides an outlet for students to come together";
    c.bench_function("hashing_embed", |b| {
        b.iter(|| function.embed(black_box(&[text])).unwrap())
    });
}

criterion_group!(benches, benchmark_query, benchmark_hashing_embedding);
criterion_main!(benches);
