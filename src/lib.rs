//! Federated Verdict - reliability-weighted consensus over independent analyzers.
//!
//! A set of [`analyzer::LocalAnalyzer`]s each score a candidate
//! [`models::Observation`]. The [`engine::AggregationEngine`] combines their
//! predictions into one [`models::AggregatedVerdict`] weighted by each
//! analyzer's reliability, keeps an append-only history, and adjusts the
//! weights as human feedback arrives.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod report;
pub mod session;

pub use analyzer::{BaselineScorer, FnScorer, LocalAnalyzer, ScoreOutput, Scorer};
pub use engine::{AggregationEngine, RepeatFeedback, SharedEngine};
pub use error::{EngineError, Result, ScorerError};
pub use models::{AggregatedVerdict, Observation, Specialization, SystemStatus};
