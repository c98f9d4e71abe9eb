//! Embedder port (spec §6): text -> fixed-dim vector, plus cosine
//! similarity between two embeddings of matching shape.

use crate::error::Result;
use crate::vector_index::cosine_similarity;
use async_trait::async_trait;

/// A single embedding vector. `D` (the dimension) is a system-wide
/// constant per run, enforced by the producing `Embedder`.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    /// Cosine similarity; `None` on a dimension mismatch.
    pub fn similarity(&self, other: &Embedding) -> Option<f32> {
        cosine_similarity(&self.vector, &other.vector)
    }
}

/// Text -> fixed-dimension vector embedder. Implementations are expected
/// to be deterministic for identical input (spec §4.5: "ranking is
/// deterministic given fixed embeddings").
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Embedding dimension produced by this embedder.
    fn dim(&self) -> usize;
}
