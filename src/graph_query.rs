//! GraphQuery / DRIFT search (spec §4.5): `respond`, `find_documents`,
//! `get_relevant_text_units_distinct_docs`. Grounded in
//! `graphrag/graphrag.py`'s `respond`/`find_documents`/
//! `filter_relevant_text_units` — the dead ASCII-banner branch and unused
//! private helpers in `respond()` are not ported; only the path that
//! actually produces the returned text is implemented.

use crate::config::GraphSettings;
use crate::entities::{Community, Document, TextUnit};
use crate::knowledge_graph::KnowledgeGraph;
use crate::ports::{generate, Embedder, JsonModelClient, ModelSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct GlobalAnswer {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    key_insights: Vec<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

impl ModelSchema for GlobalAnswer {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {"type": "string"},
                "key_insights": {"type": "array", "items": {"type": "string"}},
                "confidence": {"type": "number"},
                "reasoning": {"type": "string"},
            },
            "required": ["answer", "key_insights", "confidence", "reasoning"],
        })
    }

    fn neutral() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
enum FollowUpTag {
    Entity,
    Relationship,
    Temporal,
    Causal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct FollowUpQuestion {
    question: String,
    tag: FollowUpTag,
    priority: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct FollowUpQuestions {
    #[serde(default)]
    questions: Vec<FollowUpQuestion>,
}

impl ModelSchema for FollowUpQuestions {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "questions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "question": {"type": "string"},
                            "tag": {"type": "string", "enum": ["entity","relationship","temporal","causal"]},
                            "priority": {"type": "number"},
                        },
                        "required": ["question", "tag", "priority"],
                    },
                },
            },
            "required": ["questions"],
        })
    }

    fn neutral() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct LocalAnswer {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    evidence: Vec<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    entity_mentions: Vec<String>,
}

impl ModelSchema for LocalAnswer {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "answer": {"type": "string"},
                "evidence": {"type": "array", "items": {"type": "string"}},
                "confidence": {"type": "number"},
                "entity_mentions": {"type": "array", "items": {"type": "string"}},
            },
            "required": ["answer", "evidence", "confidence", "entity_mentions"],
        })
    }

    fn neutral() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct SynthesisResult {
    #[serde(default)]
    executive_summary: String,
    #[serde(default)]
    global_insights: String,
    #[serde(default)]
    confidence_assessment: String,
    #[serde(default)]
    recommendations: String,
}

impl ModelSchema for SynthesisResult {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "executive_summary": {"type": "string"},
                "global_insights": {"type": "string"},
                "confidence_assessment": {"type": "string"},
                "recommendations": {"type": "string"},
            },
            "required": ["executive_summary", "global_insights", "confidence_assessment", "recommendations"],
        })
    }

    fn neutral() -> Self {
        Self::default()
    }
}

pub struct GraphQuery {
    json_client: Arc<dyn JsonModelClient>,
    embedder: Arc<dyn Embedder>,
    settings: GraphSettings,
}

impl GraphQuery {
    pub fn new(json_client: Arc<dyn JsonModelClient>, embedder: Arc<dyn Embedder>, settings: GraphSettings) -> Self {
        Self {
            json_client,
            embedder,
            settings,
        }
    }

    /// DRIFT pipeline (spec §4.5): global phase -> follow-up generation ->
    /// local phase -> synthesis. The returned text is the concatenation
    /// of the synthesis fields, matching the literal
    /// `"\n".join([executive_summary, global_insights, local_findings,
    /// confidence_assessment, recommendations])` upstream.
    pub async fn respond(&self, query: &str, kg: &KnowledgeGraph) -> String {
        let top_communities = self.select_relevant_communities(query, kg, self.settings.global_top_communities);
        let global = self.global_phase(query, &top_communities).await;

        let follow_ups = self.generate_follow_ups(&global).await;

        let mut local_findings = Vec::new();
        for follow_up in follow_ups.iter().take(5) {
            let local = self.local_phase(follow_up, kg).await;
            let confidence = local.confidence;
            local_findings.push(format!("- {}: {}", follow_up.question, local.answer));
            if confidence < self.settings.local_confidence_floor {
                debug!("local confidence {} below floor; stopping local phase", confidence);
                break;
            }
        }

        let synthesis = self.synthesize(query, &global, &local_findings).await;

        [
            synthesis.executive_summary,
            synthesis.global_insights,
            local_findings.join("\n"),
            synthesis.confidence_assessment,
            synthesis.recommendations,
        ]
        .join("\n")
    }

    /// Embed `text`; rank Documents by mean of `similarity^3` over each
    /// document's TextUnits; return the top-`k`.
    pub async fn find_documents(&self, text: &str, kg: &KnowledgeGraph, k: usize) -> Vec<Document> {
        let query_embedding = self.embedder.embed(text).await.map(|e| e.vector).unwrap_or_default();
        let mut per_document: HashMap<&str, Vec<f32>> = HashMap::new();
        for unit in &kg.text_units {
            if let Some(sim) = crate::vector_index::cosine_similarity(&query_embedding, &unit.embedding) {
                per_document.entry(unit.document_id.as_str()).or_default().push(sim);
            }
        }
        let mut scored: Vec<(&str, f64)> = per_document
            .into_iter()
            .map(|(doc_id, sims)| {
                let mean_cubed = sims.iter().map(|s| (*s as f64).powi(3)).sum::<f64>() / sims.len() as f64;
                (doc_id, mean_cubed)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .filter_map(|(doc_id, _)| kg.find_document(doc_id).cloned())
            .collect()
    }

    /// Highest-scoring TextUnit per distinct document, up to `n` (spec
    /// §4.5: "as above but at the unit level").
    pub async fn get_relevant_text_units_distinct_docs(
        &self,
        kg: &KnowledgeGraph,
        text: &str,
        n: usize,
    ) -> Vec<TextUnit> {
        let query_embedding = self.embedder.embed(text).await.map(|e| e.vector).unwrap_or_default();
        let mut best_per_document: HashMap<&str, (f32, &TextUnit)> = HashMap::new();
        for unit in &kg.text_units {
            if let Some(sim) = crate::vector_index::cosine_similarity(&query_embedding, &unit.embedding) {
                best_per_document
                    .entry(unit.document_id.as_str())
                    .and_modify(|(best_sim, best_unit)| {
                        if sim > *best_sim {
                            *best_sim = sim;
                            *best_unit = unit;
                        }
                    })
                    .or_insert((sim, unit));
            }
        }
        let mut scored: Vec<(f32, &TextUnit)> = best_per_document.into_values().collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(n).map(|(_, u)| u.clone()).collect()
    }

    fn select_relevant_communities<'a>(&self, query: &str, kg: &'a KnowledgeGraph, top_n: usize) -> Vec<&'a Community> {
        let query_lower = query.to_lowercase();
        let query_words: std::collections::HashSet<&str> = query_lower.split_whitespace().collect();

        let mut scored: Vec<(&Community, f64)> = kg
            .communities
            .iter()
            .map(|community| {
                let mut score = 0.0;
                if let Some(report) = &community.report {
                    let summary_lower = report.summary.to_lowercase();
                    score += query_words.iter().filter(|w| summary_lower.contains(**w)).count() as f64 * 2.0;
                    for entity in &report.key_entities {
                        if query_lower.contains(&entity.to_lowercase()) {
                            score += 3.0;
                        }
                        let words: std::collections::HashSet<&str> = entity.split_whitespace().collect();
                        score += query_words.intersection(&words).count() as f64;
                    }
                    for relationship in &report.key_relationships {
                        if query_lower.contains(&relationship.to_lowercase()) {
                            score += 2.0;
                        }
                    }
                }
                (community, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(top_n).map(|(c, _)| c).collect()
    }

    async fn global_phase(&self, query: &str, communities: &[&Community]) -> GlobalAnswer {
        let summaries: Vec<String> = communities
            .iter()
            .filter_map(|c| c.report.as_ref().map(|r| r.summary.clone()))
            .collect();
        let prompt = format!(
            "Query: {query}\n\nRelevant community summaries:\n{}",
            summaries.join("\n---\n")
        );
        generate(self.json_client.as_ref(), &prompt).await
    }

    async fn generate_follow_ups(&self, global: &GlobalAnswer) -> Vec<FollowUpQuestion> {
        let prompt = format!(
            "Based on this global answer, produce 3-5 follow-up questions tagged entity/relationship/temporal/causal with a priority in [0,1]:\n{}",
            global.answer
        );
        let result: FollowUpQuestions = generate(self.json_client.as_ref(), &prompt).await;
        let mut questions = result.questions;
        questions.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal));
        questions
    }

    async fn local_phase(&self, follow_up: &FollowUpQuestion, kg: &KnowledgeGraph) -> LocalAnswer {
        let units = self
            .get_relevant_text_units_distinct_docs(kg, &follow_up.question, self.settings.local_top_units)
            .await;
        let context: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let prompt = format!(
            "Follow-up question: {}\n\nRelevant excerpts:\n{}",
            follow_up.question,
            context.join("\n---\n")
        );
        generate(self.json_client.as_ref(), &prompt).await
    }

    async fn synthesize(&self, query: &str, global: &GlobalAnswer, local_findings: &[String]) -> SynthesisResult {
        let prompt = format!(
            "Synthesize a final answer to '{}'.\nGlobal answer: {}\nLocal findings:\n{}",
            query,
            global.answer,
            local_findings.join("\n")
        );
        generate(self.json_client.as_ref(), &prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Document, TextUnit};
    use async_trait::async_trait;
    use crate::error::Result;
    use crate::ports::Embedding;

    struct IdentityEmbedder;

    #[async_trait]
    impl Embedder for IdentityEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            // Deterministic 2-d embedding for test fixtures: encodes
            // whether the text contains "x" or "y".
            let x = if text.contains('A') { 1.0 } else { 0.0 };
            let y = if text.contains('C') { 1.0 } else { 0.0 };
            Ok(Embedding::new(vec![x, y]))
        }
        fn dim(&self) -> usize {
            2
        }
    }

    struct NeutralClient;

    #[async_trait]
    impl JsonModelClient for NeutralClient {
        async fn generate_json_value(&self, _prompt: &str, _schema: &Value) -> Result<Value> {
            Err(crate::error::EngineError::Transport("stub".into()))
        }
    }

    #[tokio::test]
    async fn e3_find_documents_ranking_order() {
        let query = GraphQuery::new(Arc::new(NeutralClient), Arc::new(IdentityEmbedder), GraphSettings::default());
        let mut kg = KnowledgeGraph::new(vec![
            doc("A"), doc("B"), doc("C"),
        ]);
        kg.add_text_unit(TextUnit::new("A".into(), "A".into(), 0, 1, vec![1.0, 0.0]));
        kg.add_text_unit(TextUnit::new("B".into(), "B".into(), 0, 1, vec![0.8, 0.6]));
        kg.add_text_unit(TextUnit::new("C".into(), "C".into(), 0, 1, vec![0.0, 1.0]));

        let ranked = query.find_documents("A", &kg, 3).await;
        let ids: Vec<&str> = ranked.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            title: id.to_string(),
            abstract_: String::new(),
            authors: vec![],
            content: id.to_string(),
        }
    }
}
