//! Error types for the aggregation engine.
//!
//! Nothing in the engine is fatal: registry and feedback errors are
//! recoverable, and scorer errors are isolated into exclusions.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by [`crate::engine::AggregationEngine`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Analyzer already registered: {0}")]
    DuplicateAnalyzer(String),

    #[error("Unknown sequence id {sequence_id} (history holds {history_len} analyses)")]
    UnknownSequence { sequence_id: u64, history_len: usize },

    #[error("Feedback already submitted for sequence id {0}")]
    DuplicateFeedback(u64),
}

/// Errors raised by a single scorer. These never abort an analysis; the
/// engine records them as exclusions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScorerError {
    #[error("Scoring failed: {0}")]
    Failed(String),

    #[error("Invalid prediction {0}: must be finite and within [0, 1]")]
    InvalidPrediction(f64),

    #[error("Scoring timed out after {0}ms")]
    Timeout(u64),

    #[error("Scoring task aborted: {0}")]
    Aborted(String),
}
