//! Brute-force flat index: O(n) k-NN search

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::index::Index;
use crate::vector::Embedding;

/// Above this many entries distances are computed on the rayon pool.
const PARALLEL_THRESHOLD: usize = 4096;

/// A flat (brute-force) index that computes the distance to every stored
/// embedding.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    vectors: BTreeMap<usize, Embedding>,
    metric: DistanceMetric,
}

impl FlatIndex {
    /// Create a new empty flat index with the given distance metric.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            vectors: BTreeMap::new(),
            metric,
        }
    }

    fn score(
        &self,
        query: &Embedding,
        candidates: Option<&HashSet<usize>>,
    ) -> Result<Vec<(usize, f32)>> {
        let wanted = |slot: &usize| candidates.map_or(true, |c| c.contains(slot));
        let metric = self.metric;

        if self.vectors.len() >= PARALLEL_THRESHOLD {
            self.vectors
                .par_iter()
                .filter(|(slot, _)| wanted(*slot))
                .map(|(&slot, v)| metric.distance(query, v).map(|d| (slot, d)))
                .collect()
        } else {
            self.vectors
                .iter()
                .filter(|(slot, _)| wanted(*slot))
                .map(|(&slot, v)| metric.distance(query, v).map(|d| (slot, d)))
                .collect()
        }
    }
}

impl Index for FlatIndex {
    fn add(&mut self, slot: usize, embedding: Embedding) -> Result<()> {
        self.vectors.insert(slot, embedding);
        Ok(())
    }

    fn remove(&mut self, slot: usize) -> Result<()> {
        self.vectors.remove(&slot);
        Ok(())
    }

    fn search(
        &self,
        query: &Embedding,
        k: usize,
        candidates: Option<&HashSet<usize>>,
    ) -> Result<Vec<(usize, f32)>> {
        let mut results = self.score(query, candidates)?;
        results.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        results.truncate(k);
        Ok(results)
    }

    fn get_vector(&self, slot: usize) -> Option<&Embedding> {
        self.vectors.get(&slot)
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn clear(&mut self) {
        self.vectors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_index_basic() {
        let mut index = FlatIndex::new(DistanceMetric::L2);
        index.add(0, Embedding::new(vec![1.0, 0.0, 0.0])).unwrap();
        index.add(1, Embedding::new(vec![0.0, 1.0, 0.0])).unwrap();
        index.add(2, Embedding::new(vec![1.0, 1.0, 0.0])).unwrap();

        let query = Embedding::new(vec![1.0, 0.0, 0.0]);
        let results = index.search(&query, 2, None).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0);
        assert!(results[0].1 < 1e-6);
        assert_eq!(results[1].0, 2);
    }

    #[test]
    fn test_ties_prefer_lower_slot() {
        let mut index = FlatIndex::new(DistanceMetric::L2);
        index.add(7, Embedding::new(vec![0.0, 1.0])).unwrap();
        index.add(3, Embedding::new(vec![1.0, 0.0])).unwrap();
        index.add(5, Embedding::new(vec![0.0, 1.0])).unwrap();

        let query = Embedding::new(vec![0.0, 1.0]);
        let results = index.search(&query, 3, None).unwrap();
        let slots: Vec<usize> = results.iter().map(|(s, _)| *s).collect();
        assert_eq!(slots, vec![5, 7, 3]);
    }

    #[test]
    fn test_candidates_restrict_search() {
        let mut index = FlatIndex::new(DistanceMetric::L2);
        index.add(0, Embedding::new(vec![1.0, 0.0])).unwrap();
        index.add(1, Embedding::new(vec![0.0, 1.0])).unwrap();

        let only_one: HashSet<usize> = [1].into_iter().collect();
        let query = Embedding::new(vec![1.0, 0.0]);
        let results = index.search(&query, 5, Some(&only_one)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn test_parallel_scan_matches_order() {
        let mut index = FlatIndex::new(DistanceMetric::L2);
        for slot in 0..PARALLEL_THRESHOLD + 10 {
            index
                .add(slot, Embedding::new(vec![slot as f32, 0.0]))
                .unwrap();
        }
        let query = Embedding::new(vec![42.0, 0.0]);
        let results = index.search(&query, 3, None).unwrap();
        assert_eq!(results[0].0, 42);
        assert_eq!(results[1].0, 41);
        assert_eq!(results[2].0, 43);
    }

    #[test]
    fn test_get_remove_clear() {
        let mut index = FlatIndex::new(DistanceMetric::Cosine);
        let v = Embedding::new(vec![1.0, 2.0, 3.0]);
        index.add(0, v.clone()).unwrap();
        index.add(1, Embedding::new(vec![0.0, 1.0, 0.0])).unwrap();

        assert_eq!(index.get_vector(0), Some(&v));
        assert_eq!(index.get_vector(99), None);

        index.remove(0).unwrap();
        assert_eq!(index.len(), 1);

        index.clear();
        assert!(index.is_empty());
    }
}
