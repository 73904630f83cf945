//! Index trait for pluggable search backends

use std::collections::HashSet;

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::vector::Embedding;

/// A search index that supports insertion, removal, and k-NN search.
///
/// Entries are addressed by `usize` slots. A collection hands out slots in
/// insertion order, so a lower slot means an older record; implementations
/// must break distance ties in favor of the lower slot.
pub trait Index {
    /// Add an embedding at the given slot, replacing any previous one.
    fn add(&mut self, slot: usize, embedding: Embedding) -> Result<()>;

    /// Remove the embedding at the given slot.
    fn remove(&mut self, slot: usize) -> Result<()>;

    /// Search for the `k` nearest neighbors of `query`, optionally restricted
    /// to `candidates`. Returns `(slot, distance)` pairs sorted by distance
    /// ascending.
    fn search(
        &self,
        query: &Embedding,
        k: usize,
        candidates: Option<&HashSet<usize>>,
    ) -> Result<Vec<(usize, f32)>>;

    /// Retrieve an embedding by slot.
    fn get_vector(&self, slot: usize) -> Option<&Embedding>;

    /// The distance metric used by this index.
    fn metric(&self) -> DistanceMetric;

    /// The number of embeddings in this index.
    fn len(&self) -> usize;

    /// Drop every entry.
    fn clear(&mut self);

    /// Whether the index is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
