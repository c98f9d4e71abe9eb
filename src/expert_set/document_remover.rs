//! DocumentRemover (spec §4.8). Grounded in
//! `document_remover/document_remover.py`.

use super::expert::Expert;
use crate::board::SotaTable;
use crate::ports::{generate, JsonModelClient, StringResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct DeleteVote {
    #[serde(default)]
    documents_to_delete: Vec<usize>,
    #[serde(default)]
    reasoning: String,
}

/// Schema capped at `max_votes` items, so the model is never asked for more
/// indices than this round is willing to tally (spec §4.8, `max_delete_votes_per_expert`).
fn delete_vote_schema(max_votes: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "documents_to_delete": {
                "type": "array",
                "items": {"type": "integer"},
                "maxItems": max_votes,
            },
            "reasoning": {"type": "string"},
        },
        "required": ["documents_to_delete", "reasoning"],
    })
}

pub struct DocumentRemover {
    json_client: Arc<dyn JsonModelClient>,
    documents_to_remove: usize,
    max_delete_votes_per_expert: usize,
}

impl DocumentRemover {
    pub fn new(json_client: Arc<dyn JsonModelClient>, documents_to_remove: usize, max_delete_votes_per_expert: usize) -> Self {
        Self {
            json_client,
            documents_to_remove,
            max_delete_votes_per_expert,
        }
    }

    /// Returns the deliberation summary. `table` is mutated in place.
    pub async fn remove_documents(&self, table: &mut SotaTable, experts: &[Expert]) -> String {
        let (markdown, index_to_id) = table.to_markdown_with_index();
        let schema = delete_vote_schema(self.max_delete_votes_per_expert);

        let mut tally: HashMap<usize, usize> = HashMap::new();
        for expert in experts {
            let prompt = format!(
                "As expert '{}', review this SOTA table and name up to {} row indices that should be removed (irrelevant, superseded, or off-topic):\n\n{}",
                expert.name, self.max_delete_votes_per_expert, markdown
            );
            let vote: DeleteVote = match self.json_client.generate_json_value(&prompt, &schema).await {
                Ok(value) => serde_json::from_value(value).unwrap_or_default(),
                Err(_) => DeleteVote::default(),
            };
            for index in vote.documents_to_delete.into_iter().take(self.max_delete_votes_per_expert) {
                if index < index_to_id.len() {
                    *tally.entry(index).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(usize, usize)> = tally.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let to_remove: Vec<usize> = ranked.into_iter().take(self.documents_to_remove).map(|(i, _)| i).collect();

        table.remove_rows(&to_remove);
        table.garbage_collect_columns();

        let summary_prompt = format!(
            "Summarize why row indices {to_remove:?} were removed from the SOTA table."
        );
        let summary: StringResponse = generate(self.json_client.as_ref(), &summary_prompt).await;
        summary.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Document, PaperFeatures};
    use crate::error::Result;
    use async_trait::async_trait;

    struct StubClient;

    #[async_trait]
    impl JsonModelClient for StubClient {
        async fn generate_json_value(&self, _prompt: &str, schema: &Value) -> Result<Value> {
            if schema["properties"].get("documents_to_delete").is_some() {
                assert_eq!(schema["properties"]["documents_to_delete"]["maxItems"], json!(1));
                return Ok(json!({"documents_to_delete": [0, 1, 2], "reasoning": "test"}));
            }
            Ok(json!({"reasoning": "test", "value": "removed for relevance"}))
        }
    }

    fn sample_table() -> SotaTable {
        let mut table = SotaTable::new();
        table.add_feature_column("method".to_string());
        for i in 0..3 {
            let mut features = HashMap::new();
            features.insert("method".to_string(), format!("m{i}"));
            table.add_row(
                Document {
                    id: format!("d{i}"),
                    title: format!("Paper {i}"),
                    abstract_: String::new(),
                    authors: vec![],
                    content: String::new(),
                },
                PaperFeatures {
                    authors: vec![],
                    title: format!("Paper {i}"),
                    year: 2023,
                    domain: "nlp".into(),
                    features,
                },
            );
        }
        table
    }

    struct StubEmbedder;

    #[async_trait]
    impl crate::ports::Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<crate::ports::Embedding> {
            Ok(crate::ports::Embedding::new(vec![1.0]))
        }
        fn dim(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn vote_cap_limits_schema_and_truncates_votes() {
        let mut table = sample_table();
        let scratchpad = crate::expert_set::rag_scratchpad::RagScratchpad::new(
            Arc::new(StubEmbedder),
            crate::config::ChunkerSettings::default(),
        );
        let experts = vec![Expert::new("E1".to_string(), "desc".to_string(), scratchpad)];
        let remover = DocumentRemover::new(Arc::new(StubClient), 1, 1);

        remover.remove_documents(&mut table, &experts).await;

        // Only 1 vote is tallied per expert (truncated from the stub's 3),
        // and only 1 row is removed (documents_to_remove = 1).
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn remove_rows_then_gc_drops_orphan_columns() {
        let mut table = sample_table();
        table.add_feature_column("orphan".to_string());
        for (_, paper) in &mut table.rows {
            paper.features.insert("orphan".to_string(), crate::entities::NOT_AVAILABLE.to_string());
        }
        table.remove_rows(&[0, 2]);
        assert_eq!(table.rows.len(), 1);
        table.garbage_collect_columns();
        assert!(!table.features.contains(&"orphan".to_string()));
        assert!(table.features.contains(&"method".to_string()));
    }
}
