//! Aggregation engine modules.
//!
//! `coordinator` owns the registry and the append-only stores, `aggregate` holds
//! the weighting math, and `concurrent` runs scoring in parallel behind a
//! single-writer lock.

pub mod aggregate;
pub mod concurrent;
pub mod coordinator;
pub mod ledger;

pub use self::concurrent::SharedEngine;
pub use self::coordinator::{AggregationEngine, RepeatFeedback, CONSENSUS_TREND_LEN};
pub use self::ledger::{FeedbackLedger, History};
