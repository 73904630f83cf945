//! Collections: named, insertion-ordered sets of records with similarity search

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::Registry;
use crate::distance::DistanceMetric;
use crate::embedding::{embed_checked, EmbeddingFunction};
use crate::error::{Result, StoreError};
use crate::flat_index::FlatIndex;
use crate::index::Index;
use crate::record::{Metadata, Record, Where};
use crate::request::{AddRequest, DeleteRequest, GetRequest, QueryInput, QueryRequest, UpdateRequest};
use crate::vector::Embedding;

/// Options for creating a collection.
#[derive(Clone, Default)]
pub struct CollectionOptions {
    pub embedding_function: Option<Arc<dyn EmbeddingFunction>>,
    pub metric: Option<DistanceMetric>,
    pub metadata: Option<Metadata>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embedding_function(mut self, function: Arc<dyn EmbeddingFunction>) -> Self {
        self.embedding_function = Some(function);
        self
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOptions")
            .field(
                "embedding_function",
                &self.embedding_function.as_ref().map(|ef| ef.name().to_string()),
            )
            .field("metric", &self.metric)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Listing entry for a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: Uuid,
    pub name: String,
    pub metric: DistanceMetric,
    pub metadata: Option<Metadata>,
    pub embedding_function: Option<String>,
    pub count: usize,
}

/// One ranked hit of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub distance: f32,
    pub document: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Ranked hits for one query, closest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub matches: Vec<QueryMatch>,
}

impl QueryResult {
    pub fn ids(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    document: Option<String>,
    metadata: Option<Metadata>,
}

/// Per-collection defaults copied from the client settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    pub n_results: usize,
    pub peek: usize,
}

/// State behind a collection's lock.
///
/// `slots` maps record ids to their insertion slot; `entries` and the index
/// are keyed by slot, so iterating `entries` yields insertion order.
pub(crate) struct CollectionState {
    id: Uuid,
    pub(crate) name: String,
    metadata: Option<Metadata>,
    pub(crate) embedding_function: Option<Arc<dyn EmbeddingFunction>>,
    slots: HashMap<String, usize>,
    entries: BTreeMap<usize, Entry>,
    index: FlatIndex,
    next_slot: usize,
    dimension: Option<usize>,
    limits: Limits,
}

pub(crate) type SharedCollection = Arc<RwLock<CollectionState>>;

impl CollectionState {
    pub(crate) fn new(
        name: String,
        metric: DistanceMetric,
        metadata: Option<Metadata>,
        embedding_function: Option<Arc<dyn EmbeddingFunction>>,
        limits: Limits,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            metadata,
            embedding_function,
            slots: HashMap::new(),
            entries: BTreeMap::new(),
            index: FlatIndex::new(metric),
            next_slot: 0,
            dimension: None,
            limits,
        }
    }

    pub(crate) fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub(crate) fn summary(&self) -> CollectionSummary {
        CollectionSummary {
            id: self.id,
            name: self.name.clone(),
            metric: self.index.metric(),
            metadata: self.metadata.clone(),
            embedding_function: self
                .embedding_function
                .as_ref()
                .map(|ef| ef.name().to_string()),
            count: self.entries.len(),
        }
    }

    /// Cosine distance is undefined against a zero vector, so a cosine
    /// collection refuses to store or search with one.
    fn check_norms(&self, embeddings: &[&Embedding]) -> Result<()> {
        if self.index.metric() != DistanceMetric::Cosine {
            return Ok(());
        }
        match embeddings.iter().position(|e| e.norm() == 0.0) {
            Some(pos) => Err(StoreError::InvalidVector {
                reason: format!("Zero vector at position {} in a cosine collection", pos),
            }),
            None => Ok(()),
        }
    }

    fn check_dimension(&self, embeddings: &[&Embedding]) -> Result<()> {
        self.check_norms(embeddings)?;
        let mut expected = self.dimension;
        for embedding in embeddings {
            match expected {
                Some(dim) if dim != embedding.dimension() => {
                    return Err(StoreError::DimensionMismatch {
                        expected: dim,
                        actual: embedding.dimension(),
                    });
                }
                Some(_) => {}
                None => expected = Some(embedding.dimension()),
            }
        }
        Ok(())
    }

    fn record_at(&self, slot: usize) -> Option<Record> {
        let entry = self.entries.get(&slot)?;
        let embedding = self.index.get_vector(slot)?;
        Some(Record {
            id: entry.id.clone(),
            document: entry.document.clone(),
            metadata: entry.metadata.clone(),
            embedding: embedding.clone(),
        })
    }

    fn matching_slots(&self, filter: Option<&Where>) -> Option<HashSet<usize>> {
        let filter = filter.filter(|f| !f.is_empty())?;
        Some(
            self.entries
                .iter()
                .filter(|(_, entry)| filter.matches(entry.metadata.as_ref()))
                .map(|(&slot, _)| slot)
                .collect(),
        )
    }

    fn store(&mut self, record: Record) -> Result<()> {
        let slot = match self.slots.get(&record.id) {
            Some(&slot) => slot,
            None => {
                let slot = self.next_slot;
                self.next_slot += 1;
                self.slots.insert(record.id.clone(), slot);
                slot
            }
        };
        self.dimension.get_or_insert(record.embedding.dimension());
        self.index.add(slot, record.embedding)?;
        self.entries.insert(
            slot,
            Entry {
                id: record.id,
                document: record.document,
                metadata: record.metadata,
            },
        );
        Ok(())
    }

    /// Drop every record. Slots keep counting up.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.entries.clear();
        self.index.clear();
        self.dimension = None;
    }

    fn remove(&mut self, slot: usize) -> Result<()> {
        if let Some(entry) = self.entries.remove(&slot) {
            self.slots.remove(&entry.id);
        }
        self.index.remove(slot)?;
        if self.entries.is_empty() {
            self.dimension = None;
        }
        Ok(())
    }
}

/// How `write` treats ids that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Insert,
    Upsert,
}

/// Handle to a collection owned by a [`Client`](crate::Client).
///
/// Handles do not keep the collection alive: once it is deleted, or the
/// client is reset or dropped, every operation on the handle fails with
/// [`StoreError::CollectionNotFound`].
#[derive(Clone)]
pub struct Collection {
    state: Weak<RwLock<CollectionState>>,
    registry: Weak<RwLock<Registry>>,
    name: String,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).finish()
    }
}

impl Collection {
    pub(crate) fn new(
        state: &SharedCollection,
        registry: &Arc<RwLock<Registry>>,
        name: String,
    ) -> Self {
        Self {
            state: Arc::downgrade(state),
            registry: Arc::downgrade(registry),
            name,
        }
    }

    fn shared(&self) -> Result<SharedCollection> {
        self.state
            .upgrade()
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: self.name.clone(),
            })
    }

    /// Current name of the collection.
    pub fn name(&self) -> Result<String> {
        Ok(self.shared()?.read()?.name.clone())
    }

    pub fn id(&self) -> Result<Uuid> {
        Ok(self.shared()?.read()?.id)
    }

    pub fn metric(&self) -> Result<DistanceMetric> {
        Ok(self.shared()?.read()?.index.metric())
    }

    pub fn metadata(&self) -> Result<Option<Metadata>> {
        Ok(self.shared()?.read()?.metadata.clone())
    }

    pub fn embedding_function(&self) -> Result<Option<Arc<dyn EmbeddingFunction>>> {
        Ok(self.shared()?.read()?.embedding_function.clone())
    }

    pub fn summary(&self) -> Result<CollectionSummary> {
        Ok(self.shared()?.read()?.summary())
    }

    /// Number of records currently held.
    pub fn count(&self) -> Result<usize> {
        Ok(self.shared()?.read()?.entries.len())
    }

    /// Add new records. Fails without storing anything if any id already
    /// exists.
    pub fn add(&self, request: AddRequest) -> Result<()> {
        self.write(request, WriteMode::Insert)
    }

    /// Add new records and replace existing ones. A replaced record keeps its
    /// position in insertion order.
    pub fn upsert(&self, request: AddRequest) -> Result<()> {
        self.write(request, WriteMode::Upsert)
    }

    fn write(&self, request: AddRequest, mode: WriteMode) -> Result<()> {
        request.validate()?;
        let shared = self.shared()?;

        let AddRequest {
            ids,
            documents,
            metadatas,
            embeddings,
        } = request;

        let embeddings = match embeddings {
            Some(embeddings) => {
                for embedding in &embeddings {
                    embedding.validate()?;
                }
                embeddings
            }
            None => {
                // validate() guarantees documents are present here
                let documents = documents.as_deref().unwrap_or_default();
                let function = shared.read()?.embedding_function.clone().ok_or_else(|| {
                    StoreError::validation(
                        "Collection has no embedding function; supply embeddings",
                    )
                })?;
                let texts: Vec<&str> = documents.iter().map(String::as_str).collect();
                embed_checked(function.as_ref(), &texts)?
            }
        };

        let mut documents = documents.map(Vec::into_iter);
        let mut metadatas = metadatas.map(Vec::into_iter);
        let records: Vec<Record> = ids
            .into_iter()
            .zip(embeddings)
            .map(|(id, embedding)| Record {
                id,
                document: documents.as_mut().and_then(Iterator::next),
                metadata: metadatas.as_mut().and_then(Iterator::next),
                embedding,
            })
            .collect();

        let mut state = shared.write()?;
        let vectors: Vec<&Embedding> = records.iter().map(|r| &r.embedding).collect();
        state.check_dimension(&vectors)?;
        if mode == WriteMode::Insert {
            if let Some(existing) = records.iter().find(|r| state.slots.contains_key(&r.id)) {
                return Err(StoreError::DuplicateId {
                    id: existing.id.clone(),
                });
            }
        }

        let count = records.len();
        for record in records {
            state.store(record)?;
        }
        tracing::debug!(
            collection = %state.name,
            count,
            upsert = mode == WriteMode::Upsert,
            "stored records"
        );
        Ok(())
    }

    /// Read records. With ids, records come back in the requested order and
    /// unknown ids are skipped; otherwise in insertion order. `offset` and
    /// `limit` apply after filtering.
    pub fn get(&self, request: GetRequest) -> Result<Vec<Record>> {
        let shared = self.shared()?;
        let state = shared.read()?;
        let filter = request.filter.as_ref();
        let keep = |slot: &usize| {
            filter.map_or(true, |f| {
                state
                    .entries
                    .get(slot)
                    .is_some_and(|e| f.matches(e.metadata.as_ref()))
            })
        };

        let slots: Vec<usize> = match &request.ids {
            Some(ids) => {
                let mut seen = HashSet::new();
                ids.iter()
                    .filter_map(|id| state.slots.get(id).copied())
                    .filter(|slot| seen.insert(*slot))
                    .filter(|slot| keep(slot))
                    .collect()
            }
            None => state.entries.keys().copied().filter(|slot| keep(slot)).collect(),
        };

        Ok(slots
            .into_iter()
            .skip(request.offset)
            .take(request.limit.unwrap_or(usize::MAX))
            .filter_map(|slot| state.record_at(slot))
            .collect())
    }

    /// The first records in insertion order, up to the client's peek limit.
    pub fn peek(&self) -> Result<Vec<Record>> {
        let limit = self.shared()?.read()?.limits.peek;
        self.get(GetRequest::all().limit(limit))
    }

    /// Replace the supplied fields of existing records.
    ///
    /// A new document without a new embedding is re-embedded with the
    /// collection's embedding function. Fails without changing anything if
    /// any id is unknown.
    pub fn update(&self, request: UpdateRequest) -> Result<()> {
        request.validate()?;
        let shared = self.shared()?;

        let function = {
            let state = shared.read()?;
            if let Some(missing) = request.ids.iter().find(|id| !state.slots.contains_key(*id)) {
                return Err(StoreError::RecordNotFound {
                    id: missing.clone(),
                });
            }
            state.embedding_function.clone()
        };

        let UpdateRequest {
            ids,
            documents,
            metadatas,
            embeddings,
        } = request;

        let embeddings = match (embeddings, &documents) {
            (Some(embeddings), _) => {
                for embedding in &embeddings {
                    embedding.validate()?;
                }
                Some(embeddings)
            }
            (None, Some(documents)) => {
                let function = function.ok_or_else(|| {
                    StoreError::validation(
                        "Collection has no embedding function; supply embeddings with new documents",
                    )
                })?;
                let texts: Vec<&str> = documents.iter().map(String::as_str).collect();
                Some(embed_checked(function.as_ref(), &texts)?)
            }
            (None, None) => None,
        };

        let mut state = shared.write()?;
        // Records may have been deleted while embedding ran without the lock
        let mut slots = Vec::with_capacity(ids.len());
        for id in &ids {
            let slot = state
                .slots
                .get(id)
                .copied()
                .ok_or_else(|| StoreError::RecordNotFound { id: id.clone() })?;
            slots.push(slot);
        }
        if let Some(embeddings) = &embeddings {
            // Replacing every record drops the old dimension constraint
            if slots.len() < state.entries.len() {
                let vectors: Vec<&Embedding> = embeddings.iter().collect();
                state.check_dimension(&vectors)?;
            } else if let Some(first) = embeddings.first() {
                let vectors: Vec<&Embedding> = embeddings.iter().collect();
                state.check_norms(&vectors)?;
                let all_same = embeddings.iter().all(|e| e.has_same_dimension(first));
                if !all_same {
                    return Err(StoreError::validation(
                        "Embeddings in one request must share a dimension",
                    ));
                }
                state.dimension = Some(first.dimension());
            }
        }

        let mut documents = documents.map(Vec::into_iter);
        let mut metadatas = metadatas.map(Vec::into_iter);
        let mut embeddings = embeddings.map(Vec::into_iter);
        for slot in slots {
            let document = documents.as_mut().and_then(Iterator::next);
            let metadata = metadatas.as_mut().and_then(Iterator::next);
            if let Some(embedding) = embeddings.as_mut().and_then(Iterator::next) {
                state.index.add(slot, embedding)?;
            }
            if let Some(entry) = state.entries.get_mut(&slot) {
                if let Some(document) = document {
                    entry.document = Some(document);
                }
                if let Some(metadata) = metadata {
                    entry.metadata = Some(metadata);
                }
            }
        }
        tracing::debug!(collection = %state.name, count = ids.len(), "updated records");
        Ok(())
    }

    /// Remove records matching the request and return how many were removed.
    /// Unknown ids are ignored.
    pub fn delete(&self, request: DeleteRequest) -> Result<usize> {
        request.validate()?;
        let shared = self.shared()?;
        let mut state = shared.write()?;

        let filter = request.filter.as_ref().filter(|f| !f.is_empty());
        let by_filter = |state: &CollectionState, slot: usize| {
            filter.map_or(true, |f| {
                state
                    .entries
                    .get(&slot)
                    .is_some_and(|e| f.matches(e.metadata.as_ref()))
            })
        };

        let candidates: Vec<usize> = match &request.ids {
            Some(ids) => ids.iter().filter_map(|id| state.slots.get(id).copied()).collect(),
            None => state.entries.keys().copied().collect(),
        };
        let doomed: HashSet<usize> = candidates
            .into_iter()
            .filter(|&slot| by_filter(&*state, slot))
            .collect();

        for &slot in &doomed {
            state.remove(slot)?;
        }
        tracing::debug!(collection = %state.name, count = doomed.len(), "deleted records");
        Ok(doomed.len())
    }

    /// Rename the collection. The new name must be valid and unused within
    /// the owning client.
    pub fn modify(&self, name: &str) -> Result<()> {
        let shared = self.shared()?;
        let registry = self.registry.upgrade().ok_or_else(|| StoreError::CollectionNotFound {
            name: self.name.clone(),
        })?;
        let mut registry = registry.write()?;
        registry.rename(&shared, name)
    }

    /// Rank records against each query and return the closest
    /// `n_results` per query, ascending by distance. Equal distances keep
    /// insertion order. Fewer results come back when fewer records match.
    pub fn query(&self, request: QueryRequest) -> Result<Vec<QueryResult>> {
        request.validate()?;
        let shared = self.shared()?;

        let QueryRequest {
            input,
            n_results,
            filter,
        } = request;

        let queries = match input {
            QueryInput::Embeddings(embeddings) => {
                for embedding in &embeddings {
                    embedding.validate()?;
                }
                embeddings
            }
            QueryInput::Texts(texts) => {
                let function = shared.read()?.embedding_function.clone().ok_or_else(|| {
                    StoreError::validation(
                        "Collection has no embedding function; query with embeddings",
                    )
                })?;
                let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
                embed_checked(function.as_ref(), &texts)?
            }
        };

        let state = shared.read()?;
        let k = n_results.unwrap_or(state.limits.n_results);
        let candidates = state.matching_slots(filter.as_ref());
        let available = candidates.as_ref().map_or(state.index.len(), HashSet::len);
        if k > available {
            tracing::warn!(
                collection = %state.name,
                requested = k,
                available,
                "n_results exceeds matching records; returning fewer"
            );
        }

        let mut results = Vec::with_capacity(queries.len());
        for query in &queries {
            if let Some(dim) = state.dimension {
                if query.dimension() != dim {
                    return Err(StoreError::DimensionMismatch {
                        expected: dim,
                        actual: query.dimension(),
                    });
                }
            }
            state.check_norms(&[query])?;
            let hits = state.index.search(query, k, candidates.as_ref())?;
            let matches = hits
                .into_iter()
                .filter_map(|(slot, distance)| {
                    state.entries.get(&slot).map(|entry| QueryMatch {
                        id: entry.id.clone(),
                        distance,
                        document: entry.document.clone(),
                        metadata: entry.metadata.clone(),
                    })
                })
                .collect();
            results.push(QueryResult { matches });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::config::Settings;

    fn collection() -> (Client, Collection) {
        let client = Client::new(Settings {
            default_embedding_function: false,
            ..Settings::default()
        })
        .unwrap();
        let c = client.create_collection("unit", CollectionOptions::new()).unwrap();
        (client, c)
    }

    #[test]
    fn test_dimension_resets_when_emptied() {
        let (_client, c) = collection();
        c.add(AddRequest::new(["a"]).embeddings([vec![1.0, 0.0]])).unwrap();
        assert_eq!(c.delete(DeleteRequest::ids(["a"])).unwrap(), 1);

        c.add(AddRequest::new(["b"]).embeddings([vec![1.0, 0.0, 0.0]]))
            .unwrap();
        assert_eq!(c.count().unwrap(), 1);
    }

    #[test]
    fn test_upsert_keeps_slot() {
        let (_client, c) = collection();
        c.add(AddRequest::new(["a", "b"]).embeddings([vec![1.0, 0.0], vec![0.0, 1.0]]))
            .unwrap();
        c.upsert(AddRequest::new(["a"]).embeddings([vec![0.0, 1.0]]))
            .unwrap();

        let shared = c.shared().unwrap();
        let state = shared.read().unwrap();
        assert_eq!(state.slots.get("a"), Some(&0));
        assert_eq!(state.next_slot, 2);
        assert_eq!(state.index.len(), 2);
    }

    #[test]
    fn test_update_all_embeddings_changes_dimension() {
        let (_client, c) = collection();
        c.add(AddRequest::new(["a"]).embeddings([vec![1.0, 0.0]])).unwrap();
        c.update(UpdateRequest::new(["a"]).embeddings([vec![1.0, 0.0, 0.0]]))
            .unwrap();
        assert_eq!(c.shared().unwrap().read().unwrap().dimension(), Some(3));

        c.add(AddRequest::new(["b"]).embeddings([vec![0.0, 1.0, 0.0]]))
            .unwrap();
        let err = c
            .update(UpdateRequest::new(["a"]).embeddings([vec![1.0]]))
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_query_default_n_results() {
        let client = Client::new(Settings {
            default_embedding_function: false,
            default_n_results: 2,
            ..Settings::default()
        })
        .unwrap();
        let c = client.create_collection("defaults", CollectionOptions::new()).unwrap();
        c.add(
            AddRequest::new(["a", "b", "c"])
                .embeddings([vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]]),
        )
        .unwrap();
        let results = c.query(QueryRequest::embeddings([vec![1.0, 0.0]])).unwrap();
        assert_eq!(results[0].ids(), vec!["a", "c"]);
    }

    #[test]
    fn test_query_empty_collection() {
        let (_client, c) = collection();
        let results = c
            .query(QueryRequest::embeddings([vec![1.0, 0.0]]).n_results(3))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_empty());
    }
}
