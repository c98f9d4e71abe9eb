//! ActionPicker (spec §4.7): round action vote. Grounded in
//! `action_picker/action_picker.py`.

use super::expert::Expert;
use crate::board::{SotaTable, ThesisKnowledge};
use crate::ports::{generate, BoolAnswer, JsonModelClient};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Predefined tie-break order (spec §4.7 step 3): earlier entries win ties.
const ACTION_ORDER: [ActionChoice; 4] = [
    ActionChoice::AddDocument,
    ActionChoice::RemoveDocument,
    ActionChoice::AskUser,
    ActionChoice::AcceptSota,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ActionChoice {
    AddDocument,
    RemoveDocument,
    AskUser,
    AcceptSota,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ExpertVote {
    reasoning: String,
    action_choice: ActionChoice,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct VoteResponse {
    #[serde(default)]
    votes: HashMap<String, ExpertVote>,
}

#[derive(Debug, Clone)]
pub struct ExpertPresentation {
    pub name: String,
    pub description: String,
    pub excerpts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ActionResult {
    pub action: ActionChoice,
    pub summary: String,
    pub expert_presentations: Vec<ExpertPresentation>,
}

pub struct ActionPicker {
    json_client: std::sync::Arc<dyn JsonModelClient>,
    extra_context_papers: usize,
}

impl ActionPicker {
    pub fn new(json_client: std::sync::Arc<dyn JsonModelClient>, extra_context_papers: usize) -> Self {
        Self {
            json_client,
            extra_context_papers,
        }
    }

    pub async fn pick_action(&self, topic: &ThesisKnowledge, table: &SotaTable, experts: &[Expert]) -> ActionResult {
        let mut presentations = Vec::with_capacity(experts.len());
        for expert in experts {
            let excerpts = self.gather_extra_context(expert).await;
            presentations.push(ExpertPresentation {
                name: expert.name.clone(),
                description: expert.description.clone(),
                excerpts,
            });
        }

        let prompt = format!(
            "Topic: {}\n\nThoughts: {:?}\n\nSOTA table:\n{}\n\nExperts:\n{}\n\nFor each expert, choose one action: AddDocument, RemoveDocument, AskUser, or AcceptSota.",
            topic.description,
            topic.thoughts,
            table.to_markdown(),
            presentations
                .iter()
                .map(|p| format!("- {} ({}): {}\n  excerpts: {:?}", p.name, p.description, p.description, p.excerpts))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        let schema = json!({
            "type": "object",
            "properties": {
                "votes": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "properties": {
                            "reasoning": {"type": "string"},
                            "action_choice": {
                                "type": "string",
                                "enum": ["AddDocument", "RemoveDocument", "AskUser", "AcceptSota"],
                            },
                        },
                        "required": ["reasoning", "action_choice"],
                    },
                },
            },
            "required": ["votes"],
        });

        let votes: VoteResponse = match self.json_client.generate_json_value(&prompt, &schema).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(_) => VoteResponse::default(),
        };

        let action = tally(&votes.votes);

        let summary_prompt = format!(
            "Summarize this deliberation in one or two sentences. Chosen action: {:?}. Votes: {:?}",
            action, votes.votes
        );
        let summary: crate::ports::StringResponse = generate(self.json_client.as_ref(), &summary_prompt).await;

        ActionResult {
            action,
            summary: summary.value,
            expert_presentations: presentations,
        }
    }

    async fn gather_extra_context(&self, expert: &Expert) -> Vec<String> {
        let prompt = format!(
            "As the expert '{}' ({}), do you need more supporting context before voting on the next SOTA action?",
            expert.name, expert.description
        );
        let needs: BoolAnswer = generate(self.json_client.as_ref(), &prompt).await;
        if !needs.answer {
            return Vec::new();
        }
        let chunks = expert
            .scratchpad
            .query_knowledge(&expert.description, self.extra_context_papers)
            .await;
        chunks.into_iter().map(|c| c.text).collect()
    }
}

fn tally(votes: &HashMap<String, ExpertVote>) -> ActionChoice {
    let mut counts: HashMap<ActionChoice, usize> = HashMap::new();
    for vote in votes.values() {
        *counts.entry(vote.action_choice).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return ActionChoice::AcceptSota;
    }
    let max_count = *counts.values().max().unwrap();
    ACTION_ORDER
        .into_iter()
        .find(|a| counts.get(a).copied().unwrap_or(0) == max_count)
        .unwrap_or(ActionChoice::AcceptSota)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_break_by_predefined_order() {
        let mut votes = HashMap::new();
        votes.insert(
            "e1".to_string(),
            ExpertVote {
                reasoning: "x".into(),
                action_choice: ActionChoice::AskUser,
            },
        );
        votes.insert(
            "e2".to_string(),
            ExpertVote {
                reasoning: "y".into(),
                action_choice: ActionChoice::AddDocument,
            },
        );
        // 1 vote each: AddDocument precedes AskUser in ACTION_ORDER.
        assert_eq!(tally(&votes), ActionChoice::AddDocument);
    }

    #[test]
    fn majority_wins_regardless_of_order() {
        let mut votes = HashMap::new();
        for i in 0..3 {
            votes.insert(
                format!("e{i}"),
                ExpertVote {
                    reasoning: "x".into(),
                    action_choice: ActionChoice::AcceptSota,
                },
            );
        }
        votes.insert(
            "e3".to_string(),
            ExpertVote {
                reasoning: "y".into(),
                action_choice: ActionChoice::AddDocument,
            },
        );
        assert_eq!(tally(&votes), ActionChoice::AcceptSota);
    }
}
