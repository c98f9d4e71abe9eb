//! ExpertSetDriver (spec §4.11): the round loop tying ActionPicker to its
//! three mutating actions. Grounded in
//! `expert_set_driver/expert_set_driver.py`.

use super::action_picker::{ActionChoice, ActionPicker};
use super::document_remover::DocumentRemover;
use super::expert::Expert;
use super::paper_adder::PaperAdder;
use super::user_questioner::UserQuestioner;
use crate::board::{SotaTable, ThesisKnowledge};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    AcceptedSota,
    MaxRoundsReached,
    UnknownAction,
}

pub struct RunOutcome {
    pub rounds_run: usize,
    pub stop_reason: StopReason,
    pub summaries: Vec<String>,
}

pub struct ExpertSetDriver {
    action_picker: ActionPicker,
    paper_adder: PaperAdder,
    document_remover: DocumentRemover,
    user_questioner: UserQuestioner,
    max_rounds: usize,
}

impl ExpertSetDriver {
    pub fn new(
        action_picker: ActionPicker,
        paper_adder: PaperAdder,
        document_remover: DocumentRemover,
        user_questioner: UserQuestioner,
        max_rounds: usize,
    ) -> Self {
        Self {
            action_picker,
            paper_adder,
            document_remover,
            user_questioner,
            max_rounds,
        }
    }

    /// Runs the round loop until `AcceptSota`, `max_rounds`, or an
    /// unrecognized action (spec §4.11 termination conditions).
    pub async fn run(&self, topic: &mut ThesisKnowledge, table: &mut SotaTable, experts: &mut Vec<Expert>) -> RunOutcome {
        let mut summaries = Vec::new();

        for round in 1..=self.max_rounds {
            let result = self.action_picker.pick_action(topic, table, experts).await;
            info!("round {round}: action = {:?}", result.action);
            summaries.push(result.summary.clone());

            match result.action {
                ActionChoice::AddDocument => {
                    self.paper_adder.add_papers(table, experts).await;
                }
                ActionChoice::RemoveDocument => {
                    self.document_remover.remove_documents(table, experts).await;
                }
                ActionChoice::AskUser => {
                    self.user_questioner.ask_questions(topic, experts).await;
                }
                ActionChoice::AcceptSota => {
                    return RunOutcome {
                        rounds_run: round,
                        stop_reason: StopReason::AcceptedSota,
                        summaries,
                    };
                }
            }
        }

        RunOutcome {
            rounds_run: self.max_rounds,
            stop_reason: StopReason::MaxRoundsReached,
            summaries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StopReason;

    #[test]
    fn stop_reasons_are_distinct() {
        assert_ne!(StopReason::AcceptedSota, StopReason::MaxRoundsReached);
    }
}
