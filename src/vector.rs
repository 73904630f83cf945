//! Embedding vector type

use std::str::FromStr;

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// A fixed-length numeric vector representing a document or query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    data: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of the embedding
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Check if this embedding has the same dimension as another
    pub fn has_same_dimension(&self, other: &Embedding) -> bool {
        self.dimension() == other.dimension()
    }

    /// Compute the L2 norm (magnitude) of the embedding
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Normalize to unit length
    pub fn normalize(&mut self) -> Result<()> {
        let norm = self.norm();
        if norm == 0.0 {
            return Err(StoreError::InvalidVector {
                reason: "Cannot normalize zero vector".to_string(),
            });
        }
        for x in &mut self.data {
            *x /= norm;
        }
        Ok(())
    }

    /// Rejects empty vectors and non-finite components.
    pub fn validate(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(StoreError::InvalidVector {
                reason: "Embedding must not be empty".to_string(),
            });
        }
        if let Some(pos) = self.data.iter().position(|x| !x.is_finite()) {
            return Err(StoreError::InvalidVector {
                reason: format!("Non-finite value at position {}", pos),
            });
        }
        Ok(())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(data: Vec<f32>) -> Self {
        Embedding::new(data)
    }
}

impl FromStr for Embedding {
    type Err = StoreError;

    /// Parse a comma-separated list of numbers, e.g. `"1.0, 0.5, -2"`.
    fn from_str(s: &str) -> Result<Self> {
        let data = s
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<f32>().map_err(|e| StoreError::InvalidVector {
                    reason: format!("Cannot parse '{}': {}", part, e),
                })
            })
            .collect::<Result<Vec<f32>>>()?;
        let embedding = Embedding::new(data);
        embedding.validate()?;
        Ok(embedding)
    }
}
