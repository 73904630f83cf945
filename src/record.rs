//! Records, metadata, and metadata filters

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::vector::Embedding;

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// Equality used by filters: integers and floats compare numerically.
    fn matches(&self, other: &MetadataValue) -> bool {
        match (self, other) {
            (MetadataValue::Int(a), MetadataValue::Float(b))
            | (MetadataValue::Float(b), MetadataValue::Int(a)) => (*a as f64) == *b,
            _ => self == other,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Str(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Str(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

/// Metadata attached to a record or collection.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Build a [`Metadata`] map from key/value pairs.
pub fn metadata<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Metadata
where
    K: Into<String>,
    V: Into<MetadataValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// One stored unit of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub document: Option<String>,
    pub metadata: Option<Metadata>,
    pub embedding: Embedding,
}

/// Metadata filter: every listed key must be present with an equal value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Where {
    conditions: Metadata,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, metadata: Option<&Metadata>) -> bool {
        self.conditions.iter().all(|(key, expected)| {
            metadata
                .and_then(|m| m.get(key))
                .is_some_and(|actual| actual.matches(expected))
        })
    }
}
