//! Data models for the aggregation engine.
//!
//! This module contains the records that flow between analyzers, the
//! engine, and its callers: observations, per-analyzer verdicts, the
//! aggregated verdict, history records, feedback entries and status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A candidate observation: named numeric measurements.
///
/// Any measurement may be missing; analyzers substitute defaults rather
/// than failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Optional label for the observed target (e.g. a star catalogue id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_id: Option<String>,
    /// Measurements keyed by name (`period`, `depth`, `noise`, ...).
    #[serde(flatten)]
    pub measurements: BTreeMap<String, f64>,
}

impl Observation {
    /// Creates an empty observation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for a measurement.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.measurements.insert(name.to_string(), value);
        self
    }

    /// Builder-style setter for the target label.
    pub fn with_star_id(mut self, star_id: &str) -> Self {
        self.star_id = Some(star_id.to_string());
        self
    }

    /// Returns the measurement if present.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.measurements.get(name).copied()
    }

    /// Returns the measurement or the given default.
    pub fn value_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    /// Label used in logs.
    pub fn label(&self) -> &str {
        self.star_id.as_deref().unwrap_or("unknown")
    }
}

/// What an analyzer is specialized in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Specialization {
    Transit,
    RadialVelocity,
    Imaging,
    #[default]
    General,
    Other(String),
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specialization::Transit => write!(f, "transit"),
            Specialization::RadialVelocity => write!(f, "radial_velocity"),
            Specialization::Imaging => write!(f, "imaging"),
            Specialization::General => write!(f, "general"),
            Specialization::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Specialization {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "transit" => Specialization::Transit,
            "radial_velocity" | "radial-velocity" | "rv" => Specialization::RadialVelocity,
            "imaging" => Specialization::Imaging,
            "general" => Specialization::General,
            _ => Specialization::Other(s.to_string()),
        }
    }
}

impl From<String> for Specialization {
    fn from(s: String) -> Self {
        Specialization::from(s.as_str())
    }
}

impl From<Specialization> for String {
    fn from(s: Specialization) -> Self {
        s.to_string()
    }
}

/// Structured rationale produced by one analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerExplanation {
    /// Human-readable reasoning bucket for the prediction.
    pub reasoning: String,
    /// Feature importance, summing to 1.
    pub key_factors: BTreeMap<String, f64>,
    /// Domain analysis keyed by topic.
    pub scientific_analysis: BTreeMap<String, String>,
    /// Factors affecting confidence keyed by factor name.
    pub confidence_factors: BTreeMap<String, String>,
    /// Note describing the analyzer's specialization.
    pub specialization_note: String,
}

/// Output of a single analyzer for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerVerdict {
    pub analyzer_id: String,
    /// Probability that the candidate is genuine, in [0, 1].
    pub prediction: f64,
    /// Distance from the decision boundary, scaled to [0, 1].
    pub confidence: f64,
    pub explanation: AnalyzerExplanation,
    pub feature_names: Vec<String>,
    /// Wall-clock scoring time in seconds.
    pub processing_time: f64,
}

/// Prediction and weight of one participating analyzer, as read at
/// aggregation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerSnapshot {
    pub analyzer_id: String,
    pub prediction: f64,
    pub confidence: f64,
    pub weight: f64,
}

/// An analyzer left out of an aggregation, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exclusion {
    pub analyzer_id: String,
    pub reason: String,
}

/// Explanation merged across all participating analyzers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedExplanation {
    /// Reasoning with the largest weight sum; `None` if nobody participated.
    pub primary_reasoning: Option<String>,
    /// Weight-averaged feature importance.
    pub aggregated_factors: BTreeMap<String, f64>,
    /// Scientific analysis per analyzer.
    pub individual_analyses: BTreeMap<String, BTreeMap<String, String>>,
    /// Per factor, every analyzer's remark joined as `"id: text; id: text"`.
    pub confidence_consensus: BTreeMap<String, String>,
    /// Specialization note per analyzer.
    pub specialization_insights: BTreeMap<String, String>,
}

/// The combined verdict for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedVerdict {
    /// Handle for later feedback.
    pub sequence_id: u64,
    pub prediction: f64,
    pub confidence: f64,
    pub consensus_strength: f64,
    pub explanation: AggregatedExplanation,
    /// Participating analyzers in registration order.
    pub analyzers: Vec<AnalyzerSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<Exclusion>,
}

impl AggregatedVerdict {
    /// Returns the `n` most important aggregated factors, highest first.
    pub fn top_factors(&self, n: usize) -> Vec<(&str, f64)> {
        let mut factors: Vec<(&str, f64)> = self
            .explanation
            .aggregated_factors
            .iter()
            .map(|(name, importance)| (name.as_str(), *importance))
            .collect();

        factors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        factors.truncate(n);
        factors
    }

    /// Weight the analyzer carried in this verdict, if it participated.
    pub fn weight_of(&self, analyzer_id: &str) -> Option<f64> {
        self.analyzers
            .iter()
            .find(|s| s.analyzer_id == analyzer_id)
            .map(|s| s.weight)
    }
}

/// One completed analysis. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub sequence_id: u64,
    pub timestamp: DateTime<Utc>,
    pub observation: Observation,
    /// Verdicts of participating analyzers in registration order.
    pub verdicts: Vec<AnalyzerVerdict>,
    pub aggregated: AggregatedVerdict,
}

impl AnalysisRecord {
    /// Predictions of the participating analyzers.
    pub fn predictions(&self) -> Vec<f64> {
        self.verdicts.iter().map(|v| v.prediction).collect()
    }
}

/// Human feedback on a prior analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub timestamp: DateTime<Utc>,
    pub sequence_id: u64,
    /// Whether the human judged the aggregated verdict correct.
    pub human_verdict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<bool>,
    /// Aggregated prediction of the referenced analysis.
    pub prediction: f64,
}

/// Per-analyzer statistics in a status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerStats {
    pub analyzer_id: String,
    pub reliability_weight: f64,
    pub specialization: Specialization,
    /// Total correctness samples received.
    pub sample_count: usize,
    /// Accuracy over the rolling window, if any samples exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_accuracy: Option<f64>,
}

/// Derived view of the engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub total_analyses: usize,
    pub total_feedback: usize,
    /// Share of feedback entries marked correct; 0 without feedback.
    pub system_accuracy: f64,
    pub analyzer_count: usize,
    /// Registration order.
    pub analyzers: Vec<AnalyzerStats>,
    /// Consensus strength of the last (up to) ten analyses, oldest first.
    pub consensus_trend: Vec<f64>,
}
