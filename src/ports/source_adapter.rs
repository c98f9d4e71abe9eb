//! SourceAdapter port (spec §6): keyword -> full-text documents from one
//! external source (arXiv, PubMed, a web scraper, ...).

use crate::entities::Document;
use async_trait::async_trait;
use std::collections::HashSet;

/// An inclusive `(start, end)` date range, `YYYY-MM-DD` strings as used by
/// the upstream scrapers.
pub type DateFilter = (String, String);

/// One external document source. Implementations must honor politeness
/// policies, produce only Documents with non-empty `content` when
/// possible (callers filter empties regardless), and never raise across
/// this boundary — failures are caught and logged by the caller, which
/// treats them as an empty result (spec §4.6 failure semantics).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    async fn recover(
        &self,
        query: &str,
        k: usize,
        date_filter: Option<DateFilter>,
    ) -> HashSet<Document>;
}
