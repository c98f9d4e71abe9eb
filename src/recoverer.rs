//! Recoverer (spec §4.6): bridges GraphQuery with external SourceAdapters.
//! Grounded in `recoverer_agent/recoverer_agent.py`. The source's apparent
//! dedent bug (only the last sub-query's documents get accumulated per
//! selected source) is not reproduced — sub-query results accumulate
//! across every issued query, per spec text.

use crate::config::RecovererSettings;
use crate::entities::Document;
use crate::graph_builder::GraphBuilder;
use crate::graph_query::GraphQuery;
use crate::knowledge_graph::KnowledgeGraph;
use crate::ports::{generate, BoolAnswer, DateFilter, JsonModelClient, SourceAdapter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The interface Recoverer exposes to its consumers (spec §6
/// `KnowledgeRecoverer`, implemented by the same struct for both the
/// receptionist and expert-set call sites in the upstream source).
#[async_trait]
pub trait KnowledgeRecoverer: Send + Sync {
    async fn recover_docs(&self, query: &str, k: usize) -> Vec<Document>;
    async fn get_survey_docs(&self, query: &str, k: usize) -> Vec<Document>;
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SubQuery {
    query: String,
    reasoning: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct SourceSelection {
    selected: bool,
    #[serde(default)]
    queries: Vec<SubQuery>,
    source_reasoning: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct SelectionResponse {
    #[serde(default)]
    selections: HashMap<String, SourceSelection>,
}

pub struct Recoverer {
    json_client: Arc<dyn JsonModelClient>,
    graph_query: Arc<GraphQuery>,
    graph_builder: Arc<GraphBuilder>,
    sources: Vec<Arc<dyn SourceAdapter>>,
    survey_source: Option<Arc<dyn SourceAdapter>>,
    settings: RecovererSettings,
    kg: Arc<RwLock<KnowledgeGraph>>,
    /// Per-source query history (spec §4.6 step 4), grounded in
    /// `recoverer_agent.py`'s `tracked_searches`.
    tracked_searches: RwLock<HashMap<String, Vec<String>>>,
}

impl Recoverer {
    pub fn new(
        json_client: Arc<dyn JsonModelClient>,
        graph_query: Arc<GraphQuery>,
        graph_builder: Arc<GraphBuilder>,
        sources: Vec<Arc<dyn SourceAdapter>>,
        survey_source: Option<Arc<dyn SourceAdapter>>,
        settings: RecovererSettings,
        kg: Arc<RwLock<KnowledgeGraph>>,
    ) -> Self {
        Self {
            json_client,
            graph_query,
            graph_builder,
            sources,
            survey_source,
            settings,
            kg,
            tracked_searches: RwLock::new(HashMap::new()),
        }
    }

    async fn sufficiency_check(&self, query: &str, response: &str, kg: &KnowledgeGraph) -> (bool, Vec<Document>) {
        let relevant_units = self
            .graph_query
            .get_relevant_text_units_distinct_docs(kg, response, self.settings.k)
            .await;
        let excerpts: Vec<String> = relevant_units.iter().map(|u| u.text.clone()).collect();
        let prompt = format!(
            "Query: {query}\n\nDo the following excerpts already suffice to answer the query?\n{}",
            excerpts.join("\n---\n")
        );
        let result: BoolAnswer = generate(self.json_client.as_ref(), &prompt).await;
        if result.answer {
            let documents = self.graph_query.find_documents(response, kg, self.settings.k).await;
            (true, documents)
        } else {
            (false, Vec::new())
        }
    }

    async fn select_sources(&self, query: &str) -> SelectionResponse {
        let tracked = self.tracked_searches.read().await;
        let source_infos: Vec<Value> = self
            .sources
            .iter()
            .map(|s| {
                json!({
                    "name": s.name(),
                    "description": s.description(),
                    "previous_searches": tracked.get(s.name()).cloned().unwrap_or_default(),
                })
            })
            .collect();
        drop(tracked);

        let prompt = format!(
            "Query: {query}\n\nFor each source below, decide whether it should be queried and with what sub-queries (0-3), avoiding duplicates of previous searches:\n{}",
            serde_json::to_string_pretty(&source_infos).unwrap_or_default()
        );
        let schema = json!({
            "type": "object",
            "properties": {
                "selections": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "properties": {
                            "selected": {"type": "boolean"},
                            "queries": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "query": {"type": "string"},
                                        "reasoning": {"type": "string"},
                                    },
                                    "required": ["query", "reasoning"],
                                },
                            },
                            "source_reasoning": {"type": "string"},
                        },
                        "required": ["selected", "source_reasoning"],
                    },
                },
            },
            "required": ["selections"],
        });
        match self.json_client.generate_json_value(&prompt, &schema).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(_) => SelectionResponse::default(),
        }
    }

    async fn recover_from_selected_sources(&self, selections: &SelectionResponse) -> Vec<Document> {
        let mut handles = Vec::new();
        for source in &self.sources {
            let Some(selection) = selections.selections.get(source.name()) else {
                continue;
            };
            if !selection.selected || selection.queries.is_empty() {
                continue;
            }
            let source = source.clone();
            let queries = selection.queries.clone();
            let k = self.settings.per_query_k;
            handles.push(tokio::spawn(async move {
                let mut docs = Vec::new();
                let mut issued = Vec::new();
                for sub_query in queries {
                    let date_filter: Option<DateFilter> =
                        Some(("2020-01-01".to_string(), "2025-02-20".to_string()));
                    let recovered = source.recover(&sub_query.query, k, date_filter).await;
                    docs.extend(recovered.into_iter().filter(|d| !d.content.is_empty()));
                    issued.push(sub_query.query);
                }
                (source.name().to_string(), issued, docs)
            }));
        }

        let mut all_docs = Vec::new();
        let mut tracked = self.tracked_searches.write().await;
        for handle in handles {
            match handle.await {
                Ok((source_name, issued, docs)) => {
                    tracked.entry(source_name).or_default().extend(issued);
                    all_docs.extend(docs);
                }
                Err(e) => warn!("source recovery task panicked: {e}"),
            }
        }
        all_docs
    }
}

#[async_trait]
impl KnowledgeRecoverer for Recoverer {
    /// `recover_docs(query, k)` (spec §4.6): bounded iteration over
    /// respond -> sufficiency check -> source selection -> graph update.
    async fn recover_docs(&self, query: &str, k: usize) -> Vec<Document> {
        let mut last_response = String::new();

        for iteration in 0..self.settings.max_iterations {
            let kg_snapshot = self.kg.read().await.clone();
            let response = self.graph_query.respond(query, &kg_snapshot).await;
            last_response = response.clone();

            let (sufficient, documents) = self.sufficiency_check(query, &response, &kg_snapshot).await;
            if sufficient {
                debug!("recoverer short-circuit at iteration {iteration}: graph already sufficient");
                return documents;
            }

            let selections = self.select_sources(query).await;
            let new_docs = self.recover_from_selected_sources(&selections).await;
            if !new_docs.is_empty() {
                let mut kg = self.kg.write().await;
                self.graph_builder.update_knowledge_graph(&mut kg, new_docs).await;
            }
        }

        let kg_snapshot = self.kg.read().await.clone();
        info!("recoverer exhausted {} iterations", self.settings.max_iterations);
        self.graph_query.find_documents(&last_response, &kg_snapshot, k).await
    }

    /// `get_survey_docs(query, k)`: a single configured "survey" adapter,
    /// no graph interaction (spec §4.6).
    async fn get_survey_docs(&self, query: &str, k: usize) -> Vec<Document> {
        let Some(source) = &self.survey_source else {
            warn!("no survey source configured");
            return Vec::new();
        };
        source.recover(query, k, None).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_iterations_matches_upstream_literal() {
        assert_eq!(RecovererSettings::default().max_iterations, 2);
    }
}
