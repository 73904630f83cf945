//! # Doc Collections
//!
//! An in-process document collection store.
//!
//! This library provides:
//! - A [`Client`] owning named [`Collection`]s
//! - Records with documents, scalar metadata and embeddings
//! - Pluggable [`EmbeddingFunction`]s, with a deterministic hashing embedder
//! - Brute-force similarity search (squared L2, cosine, inner product)
//!
//! ## Example
//!
//! ```rust
//! use doc_collections::{AddRequest, Client, CollectionOptions, QueryRequest, Settings};
//! use doc_collections::record::metadata;
//!
//! let client = Client::new(Settings::default())?;
//! let students = client.create_collection("Students", CollectionOptions::new())?;
//!
//! students.add(
//!     AddRequest::new(["id1", "id2"])
//!         .documents(["Alexandra studies computer science", "The chess club meets weekly"])
//!         .metadatas([metadata([("source", "student_info")]), metadata([("source", "club_info")])]),
//! )?;
//!
//! let results = students.query(QueryRequest::texts(["computer science student"]).n_results(1))?;
//! assert_eq!(results[0].ids(), vec!["id1"]);
//! # Ok::<(), doc_collections::StoreError>(())
//! ```

pub mod client;
pub mod collection;
pub mod config;
pub mod distance;
pub mod embedding;
pub mod error;
pub mod flat_index;
pub mod index;
pub mod record;
pub mod request;
pub mod vector;

pub use client::Client;
pub use collection::{Collection, CollectionOptions, CollectionSummary, QueryMatch, QueryResult};
pub use config::Settings;
pub use distance::DistanceMetric;
pub use embedding::{EmbeddingFunction, HashingEmbedding};
pub use error::{ErrorKind, Result, StoreError};
pub use flat_index::FlatIndex;
pub use index::Index;
pub use record::{Metadata, MetadataValue, Record, Where};
pub use request::{AddRequest, DeleteRequest, GetRequest, QueryInput, QueryRequest, UpdateRequest};
pub use vector::Embedding;
