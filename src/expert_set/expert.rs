//! An Expert: a domain-scoped voting participant with its own
//! [`RagScratchpad`] (spec §4.7-§4.12). Grounded in
//! `expert_set/expert.py`.

use super::rag_scratchpad::RagScratchpad;

pub struct Expert {
    pub name: String,
    pub description: String,
    pub scratchpad: RagScratchpad,
}

impl Expert {
    pub fn new(name: String, description: String, scratchpad: RagScratchpad) -> Self {
        Self {
            name,
            description,
            scratchpad,
        }
    }
}
