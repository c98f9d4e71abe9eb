//! PaperAdder (spec §4.10): drives SOTA growth via per-chunk feature
//! extraction. Grounded in `paper_adder/paper_adder.py`. Resolves the
//! "multi-expert parallelism" question per SPEC_FULL.md §11: chunk-level
//! extraction runs parallel across chunks of a single document, anchored
//! on `experts[0]`'s description, one document at a time.

use super::expert::Expert;
use crate::board::SotaTable;
use crate::chunker::{ChunkerConfig, TextChunker};
use crate::entities::{Document, PaperFeatures, NOT_AVAILABLE};
use crate::ports::{generate, JsonModelClient, ModelSchema, SchemaBuilder};
use crate::recoverer::KnowledgeRecoverer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SearchReasoning {
    reasoning: String,
    what_to_search: String,
}

impl ModelSchema for SearchReasoning {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": {"type": "string"},
                "what_to_search": {"type": "string"},
            },
            "required": ["reasoning", "what_to_search"],
        })
    }

    fn neutral() -> Self {
        Self {
            reasoning: String::new(),
            what_to_search: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct NewFeatureNames {
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    new_features: Vec<String>,
}

impl ModelSchema for NewFeatureNames {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": {"type": "string"},
                "new_features": {"type": "array", "items": {"type": "string"}, "maxItems": 3},
            },
            "required": ["reasoning", "new_features"],
        })
    }

    fn neutral() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct NovelFeatureNames {
    #[serde(default)]
    novel_features: Vec<String>,
}

impl ModelSchema for NovelFeatureNames {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "novel_features": {"type": "array", "items": {"type": "string"}, "maxItems": 7},
            },
            "required": ["novel_features"],
        })
    }

    fn neutral() -> Self {
        Self::default()
    }
}

/// Per-chunk extraction results, accumulated under a single mutex (spec
/// §4.10 concurrency note: "single mutex around appends to the shared
/// chunk-result lists").
#[derive(Debug, Clone, Default)]
struct ChunkResult {
    existing: HashMap<String, String>,
    new_feature_candidates: Vec<String>,
    new_feature_values: HashMap<String, String>,
}

pub struct PaperAdder {
    json_client: Arc<dyn JsonModelClient>,
    recoverer: Arc<dyn KnowledgeRecoverer>,
    worker_pool_size: usize,
    recover_k: usize,
    chunk_tokens: usize,
}

impl PaperAdder {
    pub fn new(
        json_client: Arc<dyn JsonModelClient>,
        recoverer: Arc<dyn KnowledgeRecoverer>,
        worker_pool_size: usize,
        recover_k: usize,
        chunk_tokens: usize,
    ) -> Self {
        Self {
            json_client,
            recoverer,
            worker_pool_size,
            recover_k,
            chunk_tokens,
        }
    }

    /// Returns a short summary of what was added; mutates `table` in place.
    pub async fn add_papers(&self, table: &mut SotaTable, experts: &[Expert]) -> String {
        if experts.is_empty() {
            return "no experts available".to_string();
        }

        let mut searches = Vec::with_capacity(experts.len());
        for expert in experts {
            let prompt = format!(
                "As expert '{}' ({}), what should be searched for next to grow the SOTA comparison?",
                expert.name, expert.description
            );
            let reasoning: SearchReasoning = generate(self.json_client.as_ref(), &prompt).await;
            searches.push(reasoning.what_to_search);
        }

        let synth_prompt = format!(
            "Synthesize these per-expert search intents into one focused research target description:\n{}",
            searches.join("\n- ")
        );
        let target: crate::ports::StringResponse = generate(self.json_client.as_ref(), &synth_prompt).await;

        let new_docs = self.recoverer.recover_docs(&target.value, self.recover_k).await;
        if new_docs.is_empty() {
            return "no new documents recovered".to_string();
        }

        let anchor = experts[0].description.clone();
        let mut added = 0usize;
        for doc in new_docs {
            match self.process_document(&doc, &anchor, &table.features).await {
                Some((new_columns, features)) => {
                    for column in new_columns {
                        table.add_feature_column(column);
                    }
                    table.add_row(doc, features);
                    added += 1;
                }
                None => warn!("skipping document '{}' after extraction failure", doc.id),
            }
        }

        format!("added {added} paper(s) to the SOTA table")
    }

    /// Per-document pipeline (spec §4.10 step 3): chunk, extract per-chunk,
    /// consolidate, compute year/domain. Returns `None` on an aborting
    /// failure (empty document after chunking).
    async fn process_document(
        &self,
        doc: &Document,
        anchor_description: &str,
        current_columns: &[String],
    ) -> Option<(Vec<String>, PaperFeatures)> {
        let chunker = TextChunker::new(ChunkerConfig::new(self.chunk_tokens, 0));
        let chunks = chunker.chunk(&doc.content);
        if chunks.is_empty() {
            return None;
        }

        let results = Arc::new(Mutex::new(Vec::with_capacity(chunks.len())));
        let semaphore = Arc::new(Semaphore::new(self.worker_pool_size));
        let mut handles = Vec::new();

        for chunk in chunks {
            let semaphore = semaphore.clone();
            let client = self.json_client.clone();
            let columns = current_columns.to_vec();
            let anchor = anchor_description.to_string();
            let results = results.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                let result = extract_chunk(client.as_ref(), &anchor, &chunk.text, &columns).await;
                results.lock().await.push(result);
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let chunk_results = Arc::try_unwrap(results).expect("no outstanding handles").into_inner();

        let existing_features = self.consolidate_existing(current_columns, &chunk_results).await;
        let (new_columns, new_features) = self.consolidate_new(current_columns, &chunk_results).await;

        let mut features = existing_features;
        features.extend(new_features);

        let year = extract_year(&doc.id);
        let domain = self.extract_domain(&doc.title, &doc.abstract_).await;

        Some((
            new_columns,
            PaperFeatures {
                authors: doc.authors.clone(),
                title: doc.title.clone(),
                year,
                domain,
                features,
            },
        ))
    }

    async fn consolidate_existing(&self, columns: &[String], chunk_results: &[ChunkResult]) -> HashMap<String, String> {
        let mut consolidated = HashMap::new();
        for column in columns {
            let values: Vec<String> = chunk_results
                .iter()
                .filter_map(|r| r.existing.get(column).cloned())
                .filter(|v| v != NOT_AVAILABLE)
                .collect();
            if values.is_empty() {
                consolidated.insert(column.clone(), NOT_AVAILABLE.to_string());
                continue;
            }
            let prompt = format!(
                "Consolidate these extracted values for the '{column}' feature into one value:\n{}",
                values.join("\n- ")
            );
            let result: crate::ports::StringResponse = generate(self.json_client.as_ref(), &prompt).await;
            consolidated.insert(column.clone(), result.value);
        }
        consolidated
    }

    async fn consolidate_new(
        &self,
        current_columns: &[String],
        chunk_results: &[ChunkResult],
    ) -> (Vec<String>, HashMap<String, String>) {
        let candidates: Vec<String> = chunk_results
            .iter()
            .flat_map(|r| r.new_feature_candidates.iter().cloned())
            .collect();
        if candidates.is_empty() {
            return (Vec::new(), HashMap::new());
        }

        let dedup_prompt = format!(
            "Existing SOTA columns: {:?}\n\nCandidate new feature names (from multiple chunks): {:?}\n\nReturn up to 7 truly novel, deduplicated feature names not already covered by the existing columns.",
            current_columns, candidates
        );
        let novel: NovelFeatureNames = generate(self.json_client.as_ref(), &dedup_prompt).await;
        if novel.novel_features.is_empty() {
            return (Vec::new(), HashMap::new());
        }

        let per_feature_context: HashMap<String, Vec<String>> = chunk_results.iter().fold(HashMap::new(), |mut acc, r| {
            for name in &novel.novel_features {
                if let Some(value) = r.new_feature_values.get(name) {
                    acc.entry(name.clone()).or_default().push(value.clone());
                }
            }
            acc
        });
        let prompt = format!(
            "Per-chunk extracted values for each new feature:\n{}",
            serde_json::to_string_pretty(&per_feature_context).unwrap_or_default()
        );
        let consolidated = SchemaBuilder::generate_record(self.json_client.as_ref(), &prompt, &novel.novel_features).await;
        (novel.novel_features, consolidated)
    }

    async fn extract_domain(&self, title: &str, abstract_text: &str) -> String {
        let prompt = format!("What research domain does this paper belong to (one short phrase)?\nTitle: {title}\nAbstract: {abstract_text}");
        let schema = crate::ports::StringResponse::schema();
        match self.json_client.generate_json_value(&prompt, &schema).await {
            Ok(value) => serde_json::from_value::<crate::ports::StringResponse>(value)
                .map(|r| r.value)
                .unwrap_or_default(),
            // Domain extraction failure defaults to an empty string, not
            // "Not Available" (SPEC_FULL.md §11, distinct from the general
            // degrade policy).
            Err(_) => String::new(),
        }
    }
}

/// Parses `YYYY-` prefix from a document id; falls back to `2023` (spec
/// §4.10 step 4, exact rule supplemented from the original source).
fn extract_year(document_id: &str) -> i32 {
    document_id
        .split('-')
        .next()
        .and_then(|prefix| prefix.parse::<i32>().ok())
        .filter(|&y| 1900 < y && y < 2100)
        .unwrap_or(2023)
}

async fn extract_chunk(
    client: &dyn JsonModelClient,
    anchor_description: &str,
    chunk_text: &str,
    current_columns: &[String],
) -> ChunkResult {
    let existing = if current_columns.is_empty() {
        HashMap::new()
    } else {
        let prompt = format!(
            "As an expert in '{anchor_description}', extract values for the following SOTA columns from this text chunk, using \"{NOT_AVAILABLE}\" where absent:\n\nColumns: {:?}\n\nChunk:\n{chunk_text}",
            current_columns
        );
        SchemaBuilder::generate_record(client, &prompt, current_columns).await
    };

    let new_names_prompt = format!(
        "As an expert in '{anchor_description}', propose up to 3 feature names clearly relevant to this topic and clearly missing from the existing columns {:?}, based on this chunk:\n\n{chunk_text}",
        current_columns
    );
    let new_names: NewFeatureNames = generate(client, &new_names_prompt).await;

    let mut new_feature_values = HashMap::new();
    for name in &new_names.new_features {
        let value_prompt = format!("What is the value of '{name}' in this text chunk?\n\n{chunk_text}");
        let value: crate::ports::StringResponse = generate(client, &value_prompt).await;
        new_feature_values.insert(name.clone(), value.value);
    }

    ChunkResult {
        existing,
        new_feature_candidates: new_names.new_features,
        new_feature_values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_parses_yyyy_prefix() {
        assert_eq!(extract_year("2021-arxiv-0001"), 2021);
    }

    #[test]
    fn year_falls_back_when_unparseable() {
        assert_eq!(extract_year("arxiv-0001"), 2023);
    }

    #[test]
    fn year_bounds_are_exclusive() {
        assert_eq!(extract_year("1900-arxiv-0001"), 2023);
        assert_eq!(extract_year("2100-arxiv-0001"), 2023);
        assert_eq!(extract_year("1901-arxiv-0001"), 1901);
        assert_eq!(extract_year("2099-arxiv-0001"), 2099);
    }
}
