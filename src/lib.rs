//! SOTA Engine
//!
//! A GraphRAG knowledge engine with an iterative retrieval-refinement loop
//! and a multi-agent deliberation layer, producing a state-of-the-art
//! comparison table for a research topic:
//! - A hierarchical knowledge graph (entities, relationships, recursive
//!   Louvain communities) built from an evolving document corpus
//! - DRIFT search (global community-level, then local text-unit-level)
//!   over that graph
//! - A Recoverer loop that fetches external documents when the graph is
//!   insufficient to answer a query
//! - An expert-set deliberation layer that grows and curates the SOTA
//!   table round by round
//!
//! # Example
//!
//! ```rust,no_run
//! use sota_engine::config::EngineConfig;
//!
//! let config = EngineConfig::default();
//! assert!(config.validate().is_ok());
//! ```

pub mod board;
pub mod cache;
pub mod chunker;
pub mod config;
pub mod entities;
pub mod error;
pub mod expert_set;
pub mod graph_builder;
pub mod graph_query;
pub mod knowledge_graph;
pub mod llm;
pub mod ports;
pub mod recoverer;
pub mod vector_index;

pub use board::{Kanban, SotaTable, Task, ThesisKnowledge};
pub use chunker::{Chunk, ChunkerConfig, TextChunker};
pub use config::EngineConfig;
pub use entities::{
    Claim, ClaimStatus, Community, CommunityReport, Document, Entity, EntityType, PaperFeatures,
    Relationship, TextUnit,
};
pub use error::{EngineError, Result};
pub use expert_set::{ActionPicker, DocumentRemover, Expert, ExpertSetDriver, PaperAdder, RagScratchpad, UserQuestioner};
pub use graph_builder::GraphBuilder;
pub use graph_query::GraphQuery;
pub use knowledge_graph::KnowledgeGraph;
pub use recoverer::{KnowledgeRecoverer, Recoverer};
pub use vector_index::VectorIndex;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with(char::is_numeric));
    }
}
