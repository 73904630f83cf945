//! CLI interface for the document collection store

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use doc_collections::record::metadata;
use doc_collections::{
    AddRequest, Client, CollectionOptions, DeleteRequest, DistanceMetric, Embedding,
    EmbeddingFunction, GetRequest, HashingEmbedding, QueryMatch, QueryRequest, Settings,
    UpdateRequest,
};

#[derive(Parser)]
#[command(name = "doc-collections")]
#[command(about = "An in-process document collection store", long_about = None)]
struct Cli {
    /// JSON settings file. Flags below override its values.
    #[arg(long)]
    config: Option<String>,

    /// Default distance metric (l2, cosine, ip)
    #[arg(long)]
    metric: Option<DistanceMetric>,

    /// Dimension of the built-in hashing embedder
    #[arg(long)]
    dimension: Option<usize>,

    /// Log debug events (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through every collection operation on sample documents
    Tour,
    /// Print hashing embeddings for the given texts as JSON
    Embed {
        /// Texts to embed
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Rank ad-hoc documents against a query
    Search {
        /// Query text
        query: String,
        /// Document to search (repeatable)
        #[arg(short, long = "doc", required = true)]
        docs: Vec<String>,
        /// Number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,
    },
    /// Rank comma-separated vectors against a query vector
    Nearest {
        /// Query vector, e.g. "1.0,0.5,-2"
        #[arg(allow_hyphen_values = true)]
        query: Embedding,
        /// Vector to search (repeatable)
        #[arg(long = "vector", required = true, allow_hyphen_values = true)]
        vectors: Vec<Embedding>,
        /// Number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,
    },
}

const STUDENT_INFO: &str = "Alexandra Thompson, a 19-year-old computer science sophomore with a 3.7 GPA, \
is a member of the programming and chess clubs who enjoys pizza, swimming, and hiking \
in her free time in hopes of working at a tech company after graduating from the University of Washington.";

const CLUB_INFO: &str = "The university chess club provides an outlet for students to come together and enjoy playing \
the classic strategy game of chess. Members of all skill levels are welcome, from beginners learning \
the rules to experienced tournament players. The club typically meets a few times per week to play casual games, \
participate in tournaments, analyze famous chess matches, and improve members' skills.";

const UNIVERSITY_INFO: &str = "The University of Washington, founded in 1861 in Seattle, is a public research university \
with over 45,000 students across three campuses in Seattle, Tacoma, and Bothell. \
As the flagship institution of the six public universities in Washington state, \
UW encompasses over 500 buildings and 20 million square feet of space, \
including one of the largest library systems in the world.";

const STUDENT_QUESTION: &str = "What is the student name?";

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "doc_collections=debug"
    } else {
        "doc_collections=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path).with_context(|| format!("loading {}", path))?,
        None => Settings::default(),
    };
    if let Some(metric) = cli.metric {
        settings.default_metric = metric;
    }
    if let Some(dimension) = cli.dimension {
        settings.embedding_dimension = dimension;
    }
    Ok(settings)
}

fn print_json<T: Serialize>(label: &str, value: &T) -> Result<()> {
    println!("{}:", label);
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn student_metadatas(separator: &str) -> Vec<doc_collections::Metadata> {
    ["student", "club", "university"]
        .iter()
        .map(|kind| metadata([("source", format!("{}{}info", kind, separator))]))
        .collect()
}

fn run_tour(client: &Client) -> Result<()> {
    // Start from a clean slate; missing collections are fine
    for name in ["Students", "Students2"] {
        if let Err(e) = client.delete_collection(name) {
            if !e.is_not_found() {
                return Err(e.into());
            }
        }
    }

    let students = client.create_collection("Students", CollectionOptions::new())?;
    students.add(
        AddRequest::new(["id1", "id2", "id3"])
            .documents([STUDENT_INFO, CLUB_INFO, UNIVERSITY_INFO])
            .metadatas(student_metadatas("_")),
    )?;
    let results = students.query(QueryRequest::texts([STUDENT_QUESTION]).n_results(2))?;
    print_json("Students query", &results)?;

    // A separately configured embedder standing in for a custom model
    let dimension = client.settings().embedding_dimension * 2;
    let custom: Arc<dyn EmbeddingFunction> = Arc::new(HashingEmbedding::new(dimension)?);
    let embeddings = custom.embed(&[STUDENT_INFO, CLUB_INFO, UNIVERSITY_INFO])?;
    println!(
        "Custom embeddings: {} vectors of dimension {}",
        embeddings.len(),
        custom.dimension()
    );

    let students2 = client.get_or_create_collection("Students2", CollectionOptions::new())?;
    students2.add(
        AddRequest::new(["id1", "id2", "id3"])
            .embeddings(embeddings)
            .documents([STUDENT_INFO, CLUB_INFO, UNIVERSITY_INFO])
            .metadatas(student_metadatas(" ")),
    )?;

    // Attach the embedder so documents are embedded automatically
    let students2 = client.get_or_create_collection(
        "Students2",
        CollectionOptions::new().embedding_function(custom.clone()),
    )?;
    students2.upsert(
        AddRequest::new(["id1", "id2", "id3"])
            .documents([STUDENT_INFO, CLUB_INFO, UNIVERSITY_INFO])
            .metadatas(student_metadatas(" ")),
    )?;
    let results = students2.query(QueryRequest::texts([STUDENT_QUESTION]).n_results(2))?;
    print_json("Students2 query", &results)?;

    students2.update(
        UpdateRequest::new(["id1"])
            .documents(["Kristiane Carina, a 19-year-old computer science sophomore with a 3.7 GPA"])
            .metadatas([metadata([("source", "student info")])]),
    )?;
    let results = students2.query(QueryRequest::texts([STUDENT_QUESTION]).n_results(2))?;
    print_json("After update", &results)?;

    students2.delete(DeleteRequest::ids(["id1"]))?;
    let results = students2.query(QueryRequest::texts([STUDENT_QUESTION]).n_results(2))?;
    print_json("After delete", &results)?;

    let vector_collections = client.create_collection("vectordb", CollectionOptions::new())?;
    vector_collections.add(
        AddRequest::new(["id1", "id2", "id3"])
            .documents([
                "This is Chroma DB CheatSheet",
                "This is Chroma DB Documentation",
                "This document Chroma JS API Docs",
            ])
            .metadatas([
                metadata([("source", "Chroma Cheatsheet")]),
                metadata([("source", "Chroma Doc")]),
                metadata([("source", "JS API Doc")]),
            ]),
    )?;
    println!("vectordb count: {}", vector_collections.count()?);

    let records = vector_collections.get(GetRequest::all())?;
    let summary: Vec<_> = records
        .iter()
        .map(|r| (r.id.as_str(), r.document.as_deref(), r.metadata.as_ref()))
        .collect();
    print_json("vectordb records", &summary)?;

    vector_collections.modify("chroma_info")?;
    print_json("Collections", &client.list_collections()?)?;

    let renamed = client.get_collection("chroma_info")?;
    println!("chroma_info count: {}", renamed.count()?);

    client.delete_collection("chroma_info")?;
    print_json("Collections after delete", &client.list_collections()?)?;

    client.reset()?;
    print_json("Collections after reset", &client.list_collections()?)?;
    Ok(())
}

fn run_search(client: &Client, query: String, docs: Vec<String>, k: usize) -> Result<()> {
    let collection = client.create_collection("search", CollectionOptions::new())?;
    let ids: Vec<String> = (1..=docs.len()).map(|i| format!("doc{}", i)).collect();
    collection.add(AddRequest::new(ids).documents(docs))?;

    let results = collection.query(QueryRequest::texts([query]).n_results(k))?;
    print_matches(results.into_iter().next().unwrap_or_default().matches);
    Ok(())
}

fn run_nearest(client: &Client, query: Embedding, vectors: Vec<Embedding>, k: usize) -> Result<()> {
    let collection = client.create_collection("nearest", CollectionOptions::new())?;
    let ids: Vec<String> = (1..=vectors.len()).map(|i| format!("vec{}", i)).collect();
    collection.add(AddRequest::new(ids).embeddings(vectors))?;

    let results = collection.query(QueryRequest::embeddings([query]).n_results(k))?;
    print_matches(results.into_iter().next().unwrap_or_default().matches);
    Ok(())
}

fn print_matches(matches: Vec<QueryMatch>) {
    if matches.is_empty() {
        println!("No results found");
    } else {
        println!("Top {} results:", matches.len());
        for (i, m) in matches.iter().enumerate() {
            println!(
                "{}. {} (distance: {:.4}) {}",
                i + 1,
                m.id,
                m.distance,
                m.document.as_deref().unwrap_or("")
            );
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(&cli)?;
    let client = Client::new(settings)?;

    match cli.command {
        Commands::Tour => run_tour(&client)?,
        Commands::Embed { texts } => {
            let function = HashingEmbedding::new(client.settings().embedding_dimension)?;
            let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
            let embeddings = function.embed(&texts)?;
            println!("{}", serde_json::to_string(&embeddings)?);
        }
        Commands::Search { query, docs, k } => run_search(&client, query, docs, k)?,
        Commands::Nearest { query, vectors, k } => run_nearest(&client, query, vectors, k)?,
    }
    Ok(())
}
