//! In-memory vector index with monotonically increasing ids (spec §4.2).

use std::sync::RwLock;

/// Cosine similarity between two equal-length vectors. Returns `None` on a
/// shape mismatch (mirrors the `Embedding.similarity` port contract in
/// spec §6).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a * norm_b))
}

/// Append-only vector store. `store` assigns ids in strictly increasing
/// order; `get_closest` does brute-force cosine ranking, which is adequate
/// at the corpus sizes this engine targets (hundreds to low thousands of
/// text units) without pulling in an external ANN index.
pub struct VectorIndex {
    vectors: RwLock<Vec<Vec<f32>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(Vec::new()),
        }
    }

    /// Appends `vector` and returns its fresh, monotonically increasing id.
    pub fn store(&self, vector: Vec<f32>) -> usize {
        let mut vectors = self.vectors.write().expect("vector index lock poisoned");
        let id = vectors.len();
        vectors.push(vector);
        id
    }

    /// Up to `k` ids by descending cosine similarity to `query`. Returns
    /// all known ids if fewer than `k` are present. Read-only and may run
    /// concurrently with other `get_closest` calls; `store` serializes
    /// against both via the write lock.
    pub fn get_closest(&self, query: &[f32], k: usize) -> Vec<usize> {
        let vectors = self.vectors.read().expect("vector index lock poisoned");
        let mut scored: Vec<(usize, f32)> = vectors
            .iter()
            .enumerate()
            .filter_map(|(id, v)| cosine_similarity(query, v).map(|s| (id, s)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(id, _)| id).collect()
    }

    pub fn get(&self, id: usize) -> Option<Vec<f32>> {
        let vectors = self.vectors.read().expect("vector index lock poisoned");
        vectors.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.vectors.read().expect("vector index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let index = VectorIndex::new();
        let id0 = index.store(vec![1.0, 0.0]);
        let id1 = index.store(vec![0.0, 1.0]);
        let id2 = index.store(vec![1.0, 1.0]);
        assert_eq!((id0, id1, id2), (0, 1, 2));
    }

    #[test]
    fn get_closest_returns_all_when_fewer_than_k() {
        let index = VectorIndex::new();
        index.store(vec![1.0, 0.0]);
        index.store(vec![0.0, 1.0]);
        let closest = index.get_closest(&[1.0, 0.0], 10);
        assert_eq!(closest.len(), 2);
    }

    #[test]
    fn e3_find_documents_ranking_order() {
        let index = VectorIndex::new();
        // A:[1,0], B:[0.8,0.6], C:[0,1]
        index.store(vec![1.0, 0.0]);
        index.store(vec![0.8, 0.6]);
        index.store(vec![0.0, 1.0]);
        let closest = index.get_closest(&[1.0, 0.0], 3);
        assert_eq!(closest, vec![0, 1, 2]);
    }

    #[test]
    fn cosine_similarity_shape_mismatch_is_none() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), None);
    }
}
