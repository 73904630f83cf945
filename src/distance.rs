//! Distance metrics for ranking query results

use crate::error::{Result, StoreError};
use crate::vector::Embedding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance metrics used to rank records. Lower is always more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    #[serde(rename = "l2")]
    L2,
    /// 1 - cosine similarity
    #[serde(rename = "cosine")]
    Cosine,
    /// 1 - dot product
    #[serde(rename = "ip")]
    InnerProduct,
}

impl DistanceMetric {
    /// Compute the distance between two embeddings using this metric
    pub fn distance(&self, v1: &Embedding, v2: &Embedding) -> Result<f32> {
        if !v1.has_same_dimension(v2) {
            return Err(StoreError::DimensionMismatch {
                expected: v1.dimension(),
                actual: v2.dimension(),
            });
        }

        match self {
            DistanceMetric::L2 => Ok(squared_l2_distance(v1, v2)),
            DistanceMetric::Cosine => cosine_distance(v1, v2),
            DistanceMetric::InnerProduct => Ok(1.0 - dot_product(v1, v2)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::InnerProduct => "ip",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            "cosine" => Ok(DistanceMetric::Cosine),
            "ip" | "dot" => Ok(DistanceMetric::InnerProduct),
            other => Err(StoreError::validation(format!(
                "Unknown distance metric '{}' (expected l2, cosine or ip)",
                other
            ))),
        }
    }
}

/// Squared Euclidean distance between two embeddings
pub fn squared_l2_distance(v1: &Embedding, v2: &Embedding) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
}

/// Compute cosine distance between two embeddings (1 - cosine similarity)
pub fn cosine_distance(v1: &Embedding, v2: &Embedding) -> Result<f32> {
    let norm1 = v1.norm();
    let norm2 = v2.norm();

    if norm1 == 0.0 || norm2 == 0.0 {
        return Err(StoreError::InvalidVector {
            reason: "Cannot compute cosine distance with zero vector".to_string(),
        });
    }

    let similarity = dot_product(v1, v2) / (norm1 * norm2);

    // Clamp to [-1, 1] to absorb rounding
    let similarity = similarity.clamp(-1.0, 1.0);

    Ok(1.0 - similarity)
}

/// Compute dot product of two embeddings
pub fn dot_product(v1: &Embedding, v2: &Embedding) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| a * b)
        .sum()
}
