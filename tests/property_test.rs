//! Property tests for collection counts and query ordering.

use std::collections::BTreeSet;

use doc_collections::{
    AddRequest, Client, CollectionOptions, DeleteRequest, DistanceMetric, QueryRequest, Settings,
};
use proptest::prelude::*;

const DIM: usize = 8;

fn client() -> Client {
    Client::new(Settings {
        embedding_dimension: DIM,
        ..Settings::default()
    })
    .unwrap()
}

/// Non-zero embeddings so every metric is defined.
fn arb_embedding() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-10.0f32..10.0f32, DIM)
        .prop_filter("non-zero embedding", |v| v.iter().any(|x| x.abs() > 1e-3))
}

fn arb_metric() -> impl Strategy<Value = DistanceMetric> {
    prop_oneof![
        Just(DistanceMetric::L2),
        Just(DistanceMetric::Cosine),
        Just(DistanceMetric::InnerProduct),
    ]
}

fn arb_records() -> impl Strategy<Value = Vec<(String, Vec<f32>)>> {
    proptest::collection::btree_map("[a-z]{1,6}", arb_embedding(), 1..30)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn count_matches_number_of_added_ids(records in arb_records()) {
        let client = client();
        let c = client.create_collection("props", CollectionOptions::new()).unwrap();
        let (ids, embeddings): (Vec<String>, Vec<Vec<f32>>) = records.into_iter().unzip();
        let n = ids.len();

        c.add(AddRequest::new(ids).embeddings(embeddings)).unwrap();
        prop_assert_eq!(c.count().unwrap(), n);
    }

    #[test]
    fn query_is_sorted_and_bounded(
        records in arb_records(),
        query in arb_embedding(),
        k in 1usize..40,
        metric in arb_metric(),
    ) {
        let client = client();
        let c = client
            .create_collection("props", CollectionOptions::new().metric(metric))
            .unwrap();
        let (ids, embeddings): (Vec<String>, Vec<Vec<f32>>) = records.into_iter().unzip();
        let n = ids.len();
        c.add(AddRequest::new(ids).embeddings(embeddings)).unwrap();

        let results = c.query(QueryRequest::embeddings([query]).n_results(k)).unwrap();
        let matches = &results[0].matches;
        prop_assert_eq!(matches.len(), k.min(n));
        for pair in matches.windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn stored_embedding_is_its_own_nearest_neighbor(records in arb_records(), pick in any::<prop::sample::Index>()) {
        let client = client();
        let c = client.create_collection("props", CollectionOptions::new()).unwrap();
        let (target_id, target) = records[pick.index(records.len())].clone();
        let (ids, embeddings): (Vec<String>, Vec<Vec<f32>>) = records.into_iter().unzip();
        c.add(AddRequest::new(ids).embeddings(embeddings)).unwrap();

        let results = c.query(QueryRequest::embeddings([target]).n_results(1)).unwrap();
        let best = &results[0].matches[0];
        prop_assert!(best.distance.abs() < 1e-4);
        // Duplicated vectors can tie; the winner must still be an exact match
        let best_vector = c
            .get(doc_collections::GetRequest::ids([best.id.clone()]))
            .unwrap()
            .remove(0)
            .embedding;
        let target_vector = c
            .get(doc_collections::GetRequest::ids([target_id]))
            .unwrap()
            .remove(0)
            .embedding;
        prop_assert_eq!(best_vector, target_vector);
    }

    #[test]
    fn delete_decrements_by_existing_ids(
        records in arb_records(),
        extra in proptest::collection::btree_set("[A-Z]{1,4}", 0..5),
        take in 0usize..30,
    ) {
        let client = client();
        let c = client.create_collection("props", CollectionOptions::new()).unwrap();
        let (ids, embeddings): (Vec<String>, Vec<Vec<f32>>) = records.into_iter().unzip();
        let n = ids.len();
        c.add(AddRequest::new(ids.clone()).embeddings(embeddings)).unwrap();

        let existing: BTreeSet<String> = ids.into_iter().take(take).collect();
        // Upper-case ids were never added
        let mut doomed: Vec<String> = existing.iter().cloned().collect();
        doomed.extend(extra);
        prop_assume!(!doomed.is_empty());

        let removed = c.delete(DeleteRequest::ids(doomed)).unwrap();
        prop_assert_eq!(removed, existing.len());
        prop_assert_eq!(c.count().unwrap(), n - existing.len());
    }
}
