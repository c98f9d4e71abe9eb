//! RagScratchpad (spec §4.12): per-expert `KnowledgeRepository<DocumentChunk>`
//! backed by an Embedder and VectorIndex. Grounded in
//! `rag_scratchpad/rag_scratchpad.py` and reuses the crate's own
//! [`VectorIndex`] rather than a second bespoke store.

use crate::chunker::{ChunkerConfig, TextChunker};
use crate::config::ChunkerSettings;
use crate::entities::Document;
use crate::ports::Embedder;
use crate::vector_index::VectorIndex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One embedded chunk of a stored document.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub document_id: String,
    pub text: String,
}

/// Per-expert knowledge store. `store_document` embeds a caller-supplied
/// projection of the document (title+abstract for surveys, full content
/// elsewhere) and chunks it with the shared [`TextChunker`] before
/// embedding each chunk separately, matching spec §4.12's
/// `store_document(doc, content_fn)` contract.
pub struct RagScratchpad {
    embedder: Arc<dyn Embedder>,
    index: VectorIndex,
    chunks: RwLock<HashMap<usize, DocumentChunk>>,
    chunker: TextChunker,
}

impl RagScratchpad {
    pub fn new(embedder: Arc<dyn Embedder>, chunker_settings: ChunkerSettings) -> Self {
        Self {
            embedder,
            index: VectorIndex::new(),
            chunks: RwLock::new(HashMap::new()),
            chunker: TextChunker::new(ChunkerConfig::new(
                chunker_settings.max_tokens,
                chunker_settings.overlap_tokens,
            )),
        }
    }

    /// Embeds and stores every chunk of `content_fn(doc)`.
    pub async fn store_document(&self, doc: &Document, content: &str) {
        let chunks = self.chunker.chunk(content);
        for chunk in chunks {
            let Ok(embedding) = self.embedder.embed(&chunk.text).await else {
                continue;
            };
            let id = self.index.store(embedding.vector);
            self.chunks.write().await.insert(
                id,
                DocumentChunk {
                    document_id: doc.id.clone(),
                    text: chunk.text,
                },
            );
        }
    }

    /// Embeds `query` and returns the `k` nearest stored chunks.
    pub async fn query_knowledge(&self, query: &str, k: usize) -> Vec<DocumentChunk> {
        let Ok(embedding) = self.embedder.embed(query).await else {
            return Vec::new();
        };
        let ids = self.index.get_closest(&embedding.vector, k);
        let chunks = self.chunks.read().await;
        ids.into_iter().filter_map(|id| chunks.get(&id).cloned()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::ports::Embedding;
    use async_trait::async_trait;

    struct WordCountEmbedder;

    #[async_trait]
    impl Embedder for WordCountEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            let len = text.split_whitespace().count() as f32;
            Ok(Embedding::new(vec![len, 1.0]))
        }
        fn dim(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn stores_and_retrieves_chunks() {
        let scratchpad = RagScratchpad::new(Arc::new(WordCountEmbedder), ChunkerSettings::default());
        let doc = Document {
            id: "d1".into(),
            title: "T".into(),
            abstract_: "A".into(),
            authors: vec![],
            content: "one two three.".into(),
        };
        scratchpad.store_document(&doc, "one two three.").await;
        assert!(!scratchpad.is_empty());
        let results = scratchpad.query_knowledge("one two three.", 1).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "d1");
    }
}
