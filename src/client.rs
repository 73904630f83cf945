//! Client: owner of all collections

use std::net::Ipv4Addr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::collection::{
    Collection, CollectionOptions, CollectionState, CollectionSummary, Limits, SharedCollection,
};
use crate::config::Settings;
use crate::embedding::{EmbeddingFunction, HashingEmbedding};
use crate::error::{Result, StoreError};

/// Collections in creation order, with their current names.
#[derive(Default)]
pub(crate) struct Registry {
    collections: Vec<(String, SharedCollection)>,
}

impl Registry {
    fn find(&self, name: &str) -> Option<&SharedCollection> {
        self.collections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    /// Rename `target`, keeping its position in creation order.
    pub(crate) fn rename(&mut self, target: &SharedCollection, name: &str) -> Result<()> {
        validate_name(name)?;
        if let Some(existing) = self.find(name) {
            if Arc::ptr_eq(existing, target) {
                return Ok(());
            }
            return Err(StoreError::DuplicateCollection {
                name: name.to_string(),
            });
        }

        let entry = self
            .collections
            .iter_mut()
            .find(|(_, c)| Arc::ptr_eq(c, target))
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: target.read().map(|s| s.name.clone()).unwrap_or_default(),
            })?;

        let mut state = target.write()?;
        tracing::info!(from = %state.name, to = name, "renamed collection");
        state.name = name.to_string();
        entry.0 = name.to_string();
        Ok(())
    }
}

/// Check a collection name: 3-63 characters from `[A-Za-z0-9._-]`, starting
/// and ending with an alphanumeric, no `..`, and not an IPv4 address.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| StoreError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("may only contain letters, digits, '.', '_' and '-'"));
    }
    let first = name.chars().next().unwrap_or('.');
    let last = name.chars().last().unwrap_or('.');
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return Err(invalid("must start and end with a letter or digit"));
    }
    if name.contains("..") {
        return Err(invalid("must not contain two consecutive periods"));
    }
    if name.parse::<Ipv4Addr>().is_ok() {
        return Err(invalid("must not be a valid IPv4 address"));
    }
    Ok(())
}

/// Owns every collection. Construct once and share by reference; all
/// methods take `&self` and are safe to call from several threads.
pub struct Client {
    settings: Settings,
    default_embedding: Option<Arc<dyn EmbeddingFunction>>,
    registry: Arc<RwLock<Registry>>,
}

impl Client {
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let default_embedding: Option<Arc<dyn EmbeddingFunction>> =
            if settings.default_embedding_function {
                Some(Arc::new(HashingEmbedding::new(settings.embedding_dimension)?))
            } else {
                None
            };

        tracing::info!(
            metric = %settings.default_metric,
            embedding_dimension = settings.embedding_dimension,
            default_embedding = settings.default_embedding_function,
            "client created"
        );

        Ok(Self {
            settings,
            default_embedding,
            registry: Arc::new(RwLock::new(Registry::default())),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn handle(&self, state: &SharedCollection, name: &str) -> Collection {
        Collection::new(state, &self.registry, name.to_string())
    }

    fn insert(&self, registry: &mut Registry, name: &str, options: CollectionOptions) -> Collection {
        let metric = options.metric.unwrap_or(self.settings.default_metric);
        let embedding_function = options
            .embedding_function
            .or_else(|| self.default_embedding.clone());
        let limits = Limits {
            n_results: self.settings.default_n_results,
            peek: self.settings.peek_limit,
        };
        let state = Arc::new(RwLock::new(CollectionState::new(
            name.to_string(),
            metric,
            options.metadata,
            embedding_function,
            limits,
        )));
        tracing::info!(collection = name, %metric, "created collection");
        let handle = self.handle(&state, name);
        registry.collections.push((name.to_string(), state));
        handle
    }

    /// Create a new collection. Fails if the name is taken.
    pub fn create_collection(&self, name: &str, options: CollectionOptions) -> Result<Collection> {
        validate_name(name)?;
        let mut registry = self.registry.write()?;
        if registry.find(name).is_some() {
            return Err(StoreError::DuplicateCollection {
                name: name.to_string(),
            });
        }
        Ok(self.insert(&mut registry, name, options))
    }

    pub fn get_collection(&self, name: &str) -> Result<Collection> {
        let registry = self.registry.read()?;
        let state = registry
            .find(name)
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: name.to_string(),
            })?;
        Ok(self.handle(state, name))
    }

    /// Return the named collection, creating it if needed.
    ///
    /// For an existing collection a supplied embedding function replaces the
    /// configured one; `metric` and `metadata` are ignored.
    pub fn get_or_create_collection(
        &self,
        name: &str,
        options: CollectionOptions,
    ) -> Result<Collection> {
        validate_name(name)?;
        let mut registry = self.registry.write()?;
        let Some(state) = registry.find(name).cloned() else {
            return Ok(self.insert(&mut registry, name, options));
        };

        if let Some(function) = options.embedding_function {
            let mut guard = state.write()?;
            if let Some(dim) = guard.dimension() {
                if dim != function.dimension() {
                    return Err(StoreError::DimensionMismatch {
                        expected: dim,
                        actual: function.dimension(),
                    });
                }
            }
            tracing::info!(
                collection = name,
                function = function.name(),
                "replaced embedding function"
            );
            guard.embedding_function = Some(function);
        }
        Ok(self.handle(&state, name))
    }

    /// Delete a collection and all its records. Outstanding handles to it
    /// become unusable.
    pub fn delete_collection(&self, name: &str) -> Result<()> {
        let mut registry = self.registry.write()?;
        let position = registry
            .collections
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: name.to_string(),
            })?;
        registry.collections.remove(position);
        tracing::info!(collection = name, "deleted collection");
        Ok(())
    }

    /// Summaries of every collection in creation order.
    pub fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let registry = self.registry.read()?;
        registry
            .collections
            .iter()
            .map(|(_, state)| -> Result<CollectionSummary> { Ok(state.read()?.summary()) })
            .collect()
    }

    pub fn count_collections(&self) -> Result<usize> {
        Ok(self.registry.read()?.collections.len())
    }

    /// Drop every collection. Irreversible.
    pub fn reset(&self) -> Result<()> {
        let mut registry = self.registry.write()?;
        let dropped = registry.collections.len();
        // Operations already holding a collection finish against empty state
        for (_, collection) in registry.collections.drain(..) {
            collection
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        tracing::info!(collections = dropped, "reset client");
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::request::AddRequest;

    fn client() -> Client {
        Client::new(Settings {
            embedding_dimension: 32,
            ..Settings::default()
        })
        .unwrap()
    }

    #[test]
    fn test_validate_name() {
        for ok in ["Students", "vectordb", "chroma_info", "a.b-c_d", "abc"] {
            assert!(validate_name(ok).is_ok(), "{ok} should be valid");
        }
        let long = "x".repeat(64);
        for bad in ["ab", "_abc", "abc-", "a..b", "has space", "127.0.0.1", long.as_str()] {
            let err = validate_name(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{bad} should be invalid");
        }
    }

    #[test]
    fn test_create_duplicate() {
        let client = client();
        client.create_collection("Students", CollectionOptions::new()).unwrap();
        let err = client
            .create_collection("Students", CollectionOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
    }

    #[test]
    fn test_get_missing() {
        let client = client();
        assert!(client.get_collection("nothing").unwrap_err().is_not_found());
        assert!(client.delete_collection("nothing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let client = client();
        let a = client
            .get_or_create_collection("Students2", CollectionOptions::new())
            .unwrap();
        let b = client
            .get_or_create_collection("Students2", CollectionOptions::new())
            .unwrap();
        assert_eq!(a.id().unwrap(), b.id().unwrap());
        assert_eq!(client.count_collections().unwrap(), 1);
    }

    #[test]
    fn test_list_in_creation_order() {
        let client = client();
        for name in ["zeta", "alpha", "mid"] {
            client.create_collection(name, CollectionOptions::new()).unwrap();
        }
        let names: Vec<String> = client
            .list_collections()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let client = client();
        let c = client.create_collection("vectordb", CollectionOptions::new()).unwrap();
        client.create_collection("other", CollectionOptions::new()).unwrap();

        client.reset().unwrap();
        assert!(client.list_collections().unwrap().is_empty());
        assert!(c.count().unwrap_err().is_not_found());
    }

    #[test]
    fn test_reset_empties_collections_still_held() {
        let client = client();
        let c = client.create_collection("held", CollectionOptions::new()).unwrap();
        c.add(AddRequest::new(["a"]).embeddings([vec![1.0, 0.0]]))
            .unwrap();
        let held = client.registry.read().unwrap().find("held").cloned().unwrap();

        client.reset().unwrap();
        let state = held.read().unwrap();
        assert_eq!(state.summary().count, 0);
        assert_eq!(state.dimension(), None);
    }

    #[test]
    fn test_rename_detached_collection_reports_its_name() {
        let client = client();
        client.create_collection("detached", CollectionOptions::new()).unwrap();
        let held = client.registry.read().unwrap().find("detached").cloned().unwrap();
        client.delete_collection("detached").unwrap();

        let err = client
            .registry
            .write()
            .unwrap()
            .rename(&held, "renamed")
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::CollectionNotFound { ref name } if name == "detached"
        ));
    }

    #[test]
    fn test_rename_to_same_name_is_noop() {
        let client = client();
        let c = client.create_collection("same", CollectionOptions::new()).unwrap();
        c.modify("same").unwrap();
        assert_eq!(c.name().unwrap(), "same");
    }
}
