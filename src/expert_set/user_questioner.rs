//! UserQuestioner (spec §4.9). Grounded in
//! `user_questioner/user_questioner.py`. Named expert-set mutation
//! semantics (`to_remove`/`to_add`) supplemented from the original source
//! per SPEC_FULL.md §11.

use super::expert::Expert;
use super::rag_scratchpad::RagScratchpad;
use crate::board::ThesisKnowledge;
use crate::config::ChunkerSettings;
use crate::entities::Document;
use crate::ports::{generate, Embedder, JsonModelClient, ModelSchema, UserApi};
use crate::recoverer::KnowledgeRecoverer;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Question {
    reasoning: String,
    question: String,
}

impl ModelSchema for Question {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": {"type": "string"},
                "question": {"type": "string"},
            },
            "required": ["reasoning", "question"],
        })
    }

    fn neutral() -> Self {
        Self {
            reasoning: String::new(),
            question: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct DescriptionUpdate {
    reasoning: String,
    updated_description: String,
}

impl ModelSchema for DescriptionUpdate {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": {"type": "string"},
                "updated_description": {"type": "string"},
            },
            "required": ["reasoning", "updated_description"],
        })
    }

    fn neutral() -> Self {
        Self {
            reasoning: String::new(),
            updated_description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct ExpertSetUpdate {
    #[serde(default)]
    to_remove: Vec<String>,
    #[serde(default)]
    to_add: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

impl ModelSchema for ExpertSetUpdate {
    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "to_remove": {"type": "array", "items": {"type": "string"}},
                "to_add": {"type": "array", "items": {"type": "string"}},
                "reasoning": {"type": "string"},
            },
            "required": ["to_remove", "to_add", "reasoning"],
        })
    }

    fn neutral() -> Self {
        Self::default()
    }
}

pub struct UserQuestioner {
    json_client: Arc<dyn JsonModelClient>,
    user_api: Arc<dyn UserApi>,
    embedder: Arc<dyn Embedder>,
    recoverer: Arc<dyn KnowledgeRecoverer>,
    chunker_settings: ChunkerSettings,
    survey_k: usize,
}

impl UserQuestioner {
    pub fn new(
        json_client: Arc<dyn JsonModelClient>,
        user_api: Arc<dyn UserApi>,
        embedder: Arc<dyn Embedder>,
        recoverer: Arc<dyn KnowledgeRecoverer>,
        chunker_settings: ChunkerSettings,
        survey_k: usize,
    ) -> Self {
        Self {
            json_client,
            user_api,
            embedder,
            recoverer,
            chunker_settings,
            survey_k,
        }
    }

    /// Mutates `topic` and `experts` in place per spec §4.9; returns the
    /// raw user reply for logging.
    pub async fn ask_questions(&self, topic: &mut ThesisKnowledge, experts: &mut Vec<Expert>) -> String {
        let mut questions = Vec::with_capacity(experts.len());
        for expert in experts.iter() {
            let prompt = format!(
                "As expert '{}' ({}), what single clarifying question would you ask the user about the topic '{}'?",
                expert.name, expert.description, topic.description
            );
            let q: Question = generate(self.json_client.as_ref(), &prompt).await;
            questions.push(q.question);
        }

        let combined_prompt = questions.join("\n");
        let reply = self.user_api.query_user(&combined_prompt).await;

        let desc_prompt = format!(
            "Current topic description: {}\n\nUser clarification: {}\n\nProduce an updated description.",
            topic.description, reply
        );
        let update: DescriptionUpdate = generate(self.json_client.as_ref(), &desc_prompt).await;
        if !update.updated_description.is_empty() {
            topic.update_description(update.updated_description);
        }
        topic.add_thought(format!("Updated description: {}", update.reasoning));

        let mutation_prompt = format!(
            "Given this user clarification: {reply}\n\nShould the expert set change? Existing experts: {:?}",
            experts.iter().map(|e| e.name.clone()).collect::<Vec<_>>()
        );
        let mutation: ExpertSetUpdate = generate(self.json_client.as_ref(), &mutation_prompt).await;

        experts.retain(|e| !mutation.to_remove.contains(&e.name));

        for (i, description) in mutation.to_add.into_iter().enumerate() {
            let new_expert = self.build_expert(i, description).await;
            experts.push(new_expert);
        }

        topic.add_thought(format!("Expert set updated: {}", mutation.reasoning));

        reply
    }

    /// Builds a new expert named `NewExpert_{index}` (index within this
    /// round's `to_add` list) and seeds its scratchpad from a survey query
    /// over the description's first sentence (spec §4.9/§11).
    async fn build_expert(&self, index: usize, description: String) -> Expert {
        let name = format!("NewExpert_{index}");
        let survey_query = format!("Recent surveys about {}", first_sentence(&description));

        let scratchpad = RagScratchpad::new(self.embedder.clone(), self.chunker_settings);
        let survey_docs: Vec<Document> = self.recoverer.get_survey_docs(&survey_query, self.survey_k).await;
        for doc in &survey_docs {
            let content = format!("{} {} {}", doc.title, doc.abstract_, doc.content);
            scratchpad.store_document(doc, &content).await;
        }

        Expert::new(name, description, scratchpad)
    }
}

/// First `.`-delimited sentence of a description, per `expert_set.py`'s
/// `description.split('.')[0]`.
fn first_sentence(description: &str) -> &str {
    description.split('.').next().unwrap_or(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sentence_splits_on_period() {
        assert_eq!(first_sentence("Graph neural networks. A survey of methods."), "Graph neural networks");
        assert_eq!(first_sentence("no period here"), "no period here");
    }

    #[test]
    fn expert_set_update_schema_allows_empty_lists() {
        let update = ExpertSetUpdate::neutral();
        assert!(update.to_remove.is_empty());
        assert!(update.to_add.is_empty());
    }
}
