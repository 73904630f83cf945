//! Embedding functions: turning documents into vectors

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{ErrorKind, Result, StoreError};
use crate::vector::Embedding;

/// Maps a batch of documents to a batch of fixed-dimension embeddings.
///
/// Implementations must be deterministic for a given configuration and
/// return exactly one embedding per input, in input order.
pub trait EmbeddingFunction: Send + Sync + fmt::Debug {
    /// Human-readable name, used in logs and collection summaries.
    fn name(&self) -> &str;

    /// Dimension of every embedding this function produces.
    fn dimension(&self) -> usize;

    fn embed(&self, documents: &[&str]) -> Result<Vec<Embedding>>;
}

/// Run `function` over `documents` and check its output.
///
/// Any failure, including a wrong number of vectors or a vector of the wrong
/// dimension, is reported as an embedding error.
pub fn embed_checked(
    function: &dyn EmbeddingFunction,
    documents: &[&str],
) -> Result<Vec<Embedding>> {
    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let embeddings = function.embed(documents).map_err(|e| match e.kind() {
        ErrorKind::Embedding => e,
        _ => StoreError::embedding(format!("{} failed: {}", function.name(), e)),
    })?;

    validate_embeddings(function, documents.len(), &embeddings)?;
    tracing::debug!(
        function = function.name(),
        count = embeddings.len(),
        "computed embeddings"
    );
    Ok(embeddings)
}

/// Check an embedding function's output against the input count and the
/// function's declared dimension.
pub fn validate_embeddings(
    function: &dyn EmbeddingFunction,
    expected_count: usize,
    embeddings: &[Embedding],
) -> Result<()> {
    if embeddings.len() != expected_count {
        return Err(StoreError::embedding(format!(
            "{} returned {} embeddings for {} documents",
            function.name(),
            embeddings.len(),
            expected_count
        )));
    }

    let dimension = function.dimension();
    for (i, embedding) in embeddings.iter().enumerate() {
        if embedding.dimension() != dimension {
            return Err(StoreError::embedding(format!(
                "{} returned dimension {} at position {}, expected {}",
                function.name(),
                embedding.dimension(),
                i,
                dimension
            )));
        }
        embedding
            .validate()
            .map_err(|e| StoreError::embedding(format!("{}: {}", function.name(), e)))?;
    }
    Ok(())
}

/// Deterministic feature-hashing embedder.
///
/// Words and the character trigrams of longer words are hashed with SHA-256
/// into signed buckets, then the vector is L2-normalized. Two texts sharing
/// vocabulary land close together under every supported metric, and the
/// same text always yields the same vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimension: usize,
}

/// Weight of a character trigram relative to a whole word.
const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(StoreError::validation(
                "Embedding dimension must be at least 1",
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut data = vec![0.0f32; self.dimension];
        let mut features = 0usize;

        for token in tokenize(text) {
            self.accumulate(&mut data, &token, 1.0);
            features += 1;

            let chars: Vec<char> = format!("<{}>", token).chars().collect();
            if chars.len() > 5 {
                for window in chars.windows(3) {
                    let gram: String = window.iter().collect();
                    self.accumulate(&mut data, &format!("#{}", gram), TRIGRAM_WEIGHT);
                }
            }
        }

        if features == 0 {
            self.accumulate(&mut data, "<empty>", 1.0);
        }

        let mut embedding = Embedding::new(data);
        // Every feature adds +-weight to some bucket; cancellation to an
        // exact zero vector is the only way normalize can fail.
        if embedding.normalize().is_err() {
            let mut data = vec![0.0f32; self.dimension];
            data[0] = 1.0;
            embedding = Embedding::new(data);
        }
        embedding
    }

    fn accumulate(&self, data: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        data[bucket] += sign * weight;
    }
}

impl EmbeddingFunction for HashingEmbedding {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, documents: &[&str]) -> Result<Vec<Embedding>> {
        Ok(documents.iter().map(|doc| self.embed_one(doc)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}
