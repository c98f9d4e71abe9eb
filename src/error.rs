//! Error handling for the SOTA engine.
//!
//! Kinds follow spec §7, not Rust type names: Transport, Schema, Quota,
//! DataShape, InvariantViolation, Cancellation. Deep components (GraphBuilder,
//! Recoverer, GraphQuery) catch these internally and degrade rather than
//! propagate; only construction-time and configuration errors surface as
//! `Result<_, EngineError>` to the CLI.

use thiserror::Error;

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error kind.
#[derive(Error, Debug)]
pub enum EngineError {
    /// HTTP failures, timeouts, rate limits. Retried with backoff inside
    /// the adapter; exhausted retries degrade to an empty result.
    #[error("transport error: {0}")]
    Transport(String),

    /// Model output does not conform to the requested schema. Retried
    /// in-place up to 3 times; final failure degrades to a neutral
    /// instance of the requested schema.
    #[error("schema validation failed: {0}")]
    Schema(String),

    /// API-key pool exhausted. Callers rotate keys and continue.
    #[error("quota exhausted: {0}")]
    Quota(String),

    /// Upstream returned missing fields or a malformed document; the
    /// single offending item is skipped by the caller.
    #[error("malformed data: {0}")]
    DataShape(String),

    /// An invariant the graph is supposed to maintain was violated, e.g.
    /// a relationship referencing an entity absent from the entity set.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// An async wait (Kanban `add_task_async`, HTTP call) was cancelled or
    /// timed out.
    #[error("cancelled or timed out: {0}")]
    Cancellation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether the caller should retry rather than degrade immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Transport(_) | EngineError::Quota(_) | EngineError::Http(_)
        )
    }

    /// Category label for logging/metrics, matching spec §7's kind names.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::Transport(_) => "transport",
            EngineError::Schema(_) => "schema",
            EngineError::Quota(_) => "quota",
            EngineError::DataShape(_) => "data_shape",
            EngineError::InvariantViolation(_) => "invariant_violation",
            EngineError::Cancellation(_) => "cancellation",
            EngineError::Config(_) => "config",
            EngineError::Io(_) => "io",
            EngineError::Serialization(_) => "serialization",
            EngineError::Http(_) => "http",
            EngineError::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_quota_are_retryable() {
        assert!(EngineError::Transport("boom".into()).is_retryable());
        assert!(EngineError::Quota("exhausted".into()).is_retryable());
        assert!(!EngineError::Schema("bad shape".into()).is_retryable());
    }

    #[test]
    fn categories_match_spec_kinds() {
        assert_eq!(EngineError::DataShape("x".into()).category(), "data_shape");
        assert_eq!(
            EngineError::InvariantViolation("x".into()).category(),
            "invariant_violation"
        );
    }
}
