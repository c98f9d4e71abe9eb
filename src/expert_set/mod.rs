//! Expert-set deliberation layer (spec §4.7-§4.12): a pool of domain-scoped
//! experts voting each round on {AddDocument, RemoveDocument, AskUser,
//! AcceptSota} to grow and curate the SOTA table.

pub mod action_picker;
pub mod document_remover;
pub mod expert;
pub mod expert_set_driver;
pub mod paper_adder;
pub mod rag_scratchpad;
pub mod user_questioner;

pub use action_picker::{ActionChoice, ActionPicker};
pub use document_remover::DocumentRemover;
pub use expert::Expert;
pub use expert_set_driver::{ExpertSetDriver, RunOutcome, StopReason};
pub use paper_adder::PaperAdder;
pub use rag_scratchpad::RagScratchpad;
pub use user_questioner::UserQuestioner;
