//! Request objects for collection operations
//!
//! Each operation takes one request value listing the options it
//! recognizes. Optional columns are `Option<Vec<_>>` and, when present, must
//! line up one-to-one with `ids`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::record::{Metadata, Where};
use crate::vector::Embedding;

fn collect_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ids.into_iter().map(Into::into).collect()
}

/// Ids must be non-empty strings, unique within the request.
pub(crate) fn check_ids(ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        return Err(StoreError::validation("Expected at least one id"));
    }
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if id.is_empty() {
            return Err(StoreError::validation("Ids must be non-empty strings"));
        }
        if !seen.insert(id.as_str()) {
            return Err(StoreError::validation(format!(
                "Id '{}' appears more than once in the request",
                id
            )));
        }
    }
    Ok(())
}

fn check_len<T>(field: &'static str, column: Option<&Vec<T>>, expected: usize) -> Result<()> {
    match column {
        Some(values) if values.len() != expected => Err(StoreError::LengthMismatch {
            field,
            expected,
            actual: values.len(),
        }),
        _ => Ok(()),
    }
}

/// Records to add or upsert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddRequest {
    pub ids: Vec<String>,
    pub documents: Option<Vec<String>>,
    pub metadatas: Option<Vec<Metadata>>,
    pub embeddings: Option<Vec<Embedding>>,
}

impl AddRequest {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: collect_ids(ids),
            ..Self::default()
        }
    }

    pub fn documents<I, S>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documents = Some(documents.into_iter().map(Into::into).collect());
        self
    }

    pub fn metadatas(mut self, metadatas: impl IntoIterator<Item = Metadata>) -> Self {
        self.metadatas = Some(metadatas.into_iter().collect());
        self
    }

    pub fn embeddings<I, E>(mut self, embeddings: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Embedding>,
    {
        self.embeddings = Some(embeddings.into_iter().map(Into::into).collect());
        self
    }

    /// Shape checks that need no collection state.
    pub(crate) fn validate(&self) -> Result<()> {
        check_ids(&self.ids)?;
        let n = self.ids.len();
        check_len("documents", self.documents.as_ref(), n)?;
        check_len("metadatas", self.metadatas.as_ref(), n)?;
        check_len("embeddings", self.embeddings.as_ref(), n)?;
        if self.documents.is_none() && self.embeddings.is_none() {
            return Err(StoreError::validation(
                "Each record needs a document or an embedding",
            ));
        }
        Ok(())
    }
}

/// Field replacements for existing records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub ids: Vec<String>,
    pub documents: Option<Vec<String>>,
    pub metadatas: Option<Vec<Metadata>>,
    pub embeddings: Option<Vec<Embedding>>,
}

impl UpdateRequest {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: collect_ids(ids),
            ..Self::default()
        }
    }

    pub fn documents<I, S>(mut self, documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documents = Some(documents.into_iter().map(Into::into).collect());
        self
    }

    pub fn metadatas(mut self, metadatas: impl IntoIterator<Item = Metadata>) -> Self {
        self.metadatas = Some(metadatas.into_iter().collect());
        self
    }

    pub fn embeddings<I, E>(mut self, embeddings: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Embedding>,
    {
        self.embeddings = Some(embeddings.into_iter().map(Into::into).collect());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_ids(&self.ids)?;
        let n = self.ids.len();
        check_len("documents", self.documents.as_ref(), n)?;
        check_len("metadatas", self.metadatas.as_ref(), n)?;
        check_len("embeddings", self.embeddings.as_ref(), n)?;
        if self.documents.is_none() && self.metadatas.is_none() && self.embeddings.is_none() {
            return Err(StoreError::validation(
                "Update needs at least one of documents, metadatas or embeddings",
            ));
        }
        Ok(())
    }
}

/// Selects records to read. An empty request returns every record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetRequest {
    pub ids: Option<Vec<String>>,
    pub filter: Option<Where>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl GetRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Some(collect_ids(ids)),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Selects records to remove, by id, by metadata, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub ids: Option<Vec<String>>,
    pub filter: Option<Where>,
}

impl DeleteRequest {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Some(collect_ids(ids)),
            filter: None,
        }
    }

    pub fn matching(filter: Where) -> Self {
        Self {
            ids: None,
            filter: Some(filter),
        }
    }

    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match (&self.ids, &self.filter) {
            (None, None) => Err(StoreError::validation(
                "Delete needs ids or a filter; refusing to delete everything",
            )),
            (Some(ids), _) if ids.is_empty() => {
                Err(StoreError::validation("Expected at least one id"))
            }
            (_, Some(filter)) if filter.is_empty() && self.ids.is_none() => Err(
                StoreError::validation("Delete filter must have at least one condition"),
            ),
            _ => Ok(()),
        }
    }
}

/// What a query searches with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryInput {
    /// Texts embedded with the collection's embedding function.
    Texts(Vec<String>),
    /// Vectors used as-is.
    Embeddings(Vec<Embedding>),
}

impl QueryInput {
    pub fn len(&self) -> usize {
        match self {
            QueryInput::Texts(texts) => texts.len(),
            QueryInput::Embeddings(embeddings) => embeddings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Nearest-neighbor query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub input: QueryInput,
    pub n_results: Option<usize>,
    pub filter: Option<Where>,
}

impl QueryRequest {
    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: QueryInput::Texts(texts.into_iter().map(Into::into).collect()),
            n_results: None,
            filter: None,
        }
    }

    pub fn embeddings<I, E>(embeddings: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Embedding>,
    {
        Self {
            input: QueryInput::Embeddings(embeddings.into_iter().map(Into::into).collect()),
            n_results: None,
            filter: None,
        }
    }

    pub fn n_results(mut self, n_results: usize) -> Self {
        self.n_results = Some(n_results);
        self
    }

    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(StoreError::validation(
                "Query needs at least one query text or embedding",
            ));
        }
        if self.n_results == Some(0) {
            return Err(StoreError::validation("n_results must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_add_requires_matching_lengths() {
        let req = AddRequest::new(["id1", "id2"]).documents(["only one"]);
        assert!(matches!(
            req.validate(),
            Err(StoreError::LengthMismatch {
                field: "documents",
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_add_requires_document_or_embedding() {
        let req = AddRequest::new(["id1"]).metadatas([Metadata::new()]);
        assert_eq!(req.validate().unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_ids_checked() {
        assert!(check_ids(&[]).is_err());
        assert!(check_ids(&["".to_string()]).is_err());
        assert!(check_ids(&["a".to_string(), "a".to_string()]).is_err());
        assert!(check_ids(&["a".to_string(), "b".to_string()]).is_ok());
    }

    #[test]
    fn test_update_needs_a_field() {
        assert!(UpdateRequest::new(["id1"]).validate().is_err());
        assert!(UpdateRequest::new(["id1"])
            .documents(["new text"])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_delete_refuses_everything() {
        assert!(DeleteRequest::default().validate().is_err());
        assert!(DeleteRequest::matching(Where::new()).validate().is_err());
        assert!(DeleteRequest::ids(Vec::<String>::new()).validate().is_err());
        assert!(DeleteRequest::ids(["id1"]).validate().is_ok());
        assert!(DeleteRequest::matching(Where::new().field("source", "x"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_query_validation() {
        assert!(QueryRequest::texts(Vec::<String>::new()).validate().is_err());
        assert!(QueryRequest::texts(["q"]).n_results(0).validate().is_err());
        assert!(QueryRequest::embeddings([vec![1.0, 0.0]])
            .n_results(3)
            .validate()
            .is_ok());
    }
}
