//! Client settings

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{Result, StoreError};

/// Settings for a [`Client`](crate::Client).
///
/// Every field has a default, so a settings file only needs the keys it
/// wants to change.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Dimension of the built-in hashing embedding function.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Metric for collections created without an explicit one.
    #[serde(default)]
    pub default_metric: DistanceMetric,

    /// Give collections created without an embedding function the built-in
    /// hashing embedder.
    #[serde(default = "default_true")]
    pub default_embedding_function: bool,

    /// `n_results` used by queries that don't set one.
    #[serde(default = "default_n_results")]
    pub default_n_results: usize,

    /// Number of records returned by `peek`.
    #[serde(default = "default_peek_limit")]
    pub peek_limit: usize,
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_true() -> bool {
    true
}

fn default_n_results() -> usize {
    10
}

fn default_peek_limit() -> usize {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding_dimension: default_embedding_dimension(),
            default_metric: DistanceMetric::default(),
            default_embedding_function: default_true(),
            default_n_results: default_n_results(),
            peek_limit: default_peek_limit(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            StoreError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(StoreError::ConfigError(
                "embedding_dimension must be at least 1".to_string(),
            ));
        }
        if self.default_n_results == 0 {
            return Err(StoreError::ConfigError(
                "default_n_results must be at least 1".to_string(),
            ));
        }
        if self.peek_limit == 0 {
            return Err(StoreError::ConfigError(
                "peek_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
