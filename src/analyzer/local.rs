//! A single local analyzer: one scorer plus an adaptive trust weight.

use crate::analyzer::explain::build_explanation;
use crate::analyzer::scorer::Scorer;
use crate::error::ScorerError;
use crate::models::{AnalyzerVerdict, Observation, Specialization};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Lower bound of the reliability weight. Never zero: it is a divisor.
pub const MIN_WEIGHT: f64 = 0.1;
/// Upper bound of the reliability weight.
pub const MAX_WEIGHT: f64 = 2.0;
/// Weight of a freshly registered analyzer.
pub const INITIAL_WEIGHT: f64 = 1.0;
/// Number of correctness samples kept for the rolling accuracy.
pub const ACCURACY_WINDOW: usize = 10;

const CORRECT_NUDGE: f64 = 1.05;
const INCORRECT_NUDGE: f64 = 0.95;
const EMA_RETAIN: f64 = 0.8;

fn clamp_weight(weight: f64) -> f64 {
    weight.clamp(MIN_WEIGHT, MAX_WEIGHT)
}

/// Run a scorer and turn its output into a verdict.
///
/// Shared by [`LocalAnalyzer::score`] and detached [`ScoringTask`]s.
pub fn run_scorer(
    analyzer_id: &str,
    specialization: &Specialization,
    scorer: &dyn Scorer,
    observation: &Observation,
) -> Result<AnalyzerVerdict, ScorerError> {
    let start = Instant::now();

    let output = scorer.score(observation)?;
    let prediction = output.prediction;
    if !prediction.is_finite() || !(0.0..=1.0).contains(&prediction) {
        return Err(ScorerError::InvalidPrediction(prediction));
    }

    let feature_names = scorer.feature_names();
    let explanation = build_explanation(
        observation,
        prediction,
        &output.attribution,
        &feature_names,
        specialization,
    );

    Ok(AnalyzerVerdict {
        analyzer_id: analyzer_id.to_string(),
        prediction,
        confidence: (prediction - 0.5).abs() * 2.0,
        explanation,
        feature_names,
        processing_time: start.elapsed().as_secs_f64(),
    })
}

/// Owned handle to an analyzer's scoring capability, detached from the
/// registry so it can run on another task.
#[derive(Clone)]
pub struct ScoringTask {
    pub analyzer_id: String,
    pub specialization: Specialization,
    scorer: Arc<dyn Scorer>,
}

impl ScoringTask {
    pub fn run(&self, observation: &Observation) -> Result<AnalyzerVerdict, ScorerError> {
        run_scorer(
            &self.analyzer_id,
            &self.specialization,
            self.scorer.as_ref(),
            observation,
        )
    }
}

/// One independent analyzer with its reliability state.
pub struct LocalAnalyzer {
    id: String,
    specialization: Specialization,
    scorer: Arc<dyn Scorer>,
    weight: f64,
    window: VecDeque<bool>,
    total_samples: usize,
}

impl LocalAnalyzer {
    /// Create an analyzer with the initial weight and an empty window.
    pub fn new(
        id: impl Into<String>,
        specialization: Specialization,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            id: id.into(),
            specialization,
            scorer,
            weight: INITIAL_WEIGHT,
            window: VecDeque::with_capacity(ACCURACY_WINDOW),
            total_samples: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn specialization(&self) -> &Specialization {
        &self.specialization
    }

    /// Current reliability weight, always within `[MIN_WEIGHT, MAX_WEIGHT]`.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Total correctness samples ever received.
    pub fn sample_count(&self) -> usize {
        self.total_samples
    }

    /// Accuracy over the rolling window, `None` before the first sample.
    pub fn recent_accuracy(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let correct = self.window.iter().filter(|c| **c).count();
        Some(correct as f64 / self.window.len() as f64)
    }

    /// Score an observation. Does not touch reliability state.
    pub fn score(&self, observation: &Observation) -> Result<AnalyzerVerdict, ScorerError> {
        run_scorer(
            &self.id,
            &self.specialization,
            self.scorer.as_ref(),
            observation,
        )
    }

    /// Detached handle for scoring outside the registry.
    pub fn scoring_task(&self) -> ScoringTask {
        ScoringTask {
            analyzer_id: self.id.clone(),
            specialization: self.specialization.clone(),
            scorer: Arc::clone(&self.scorer),
        }
    }

    /// Multiplicative nudge: ×1.05 when correct, ×0.95 otherwise, clamped.
    pub fn nudge(&mut self, is_correct: bool) {
        let factor = if is_correct {
            CORRECT_NUDGE
        } else {
            INCORRECT_NUDGE
        };
        self.weight = clamp_weight(self.weight * factor);
    }

    /// Record a correctness sample and blend the rolling accuracy into the
    /// weight: `w ← 0.8·w + 0.2·accuracy`, clamped.
    pub fn update_reliability(&mut self, feedback: bool, ground_truth: bool) {
        self.window.push_back(feedback == ground_truth);
        while self.window.len() > ACCURACY_WINDOW {
            self.window.pop_front();
        }
        self.total_samples += 1;

        let accuracy = self.recent_accuracy().unwrap_or(0.0);
        self.weight = clamp_weight(EMA_RETAIN * self.weight + (1.0 - EMA_RETAIN) * accuracy);
    }

    /// The full feedback update: nudge, then rolling-accuracy blend.
    ///
    /// A missing ground truth defaults to `is_correct`, which records the
    /// sample as correct. Both steps compound on every call. After samples with a
    /// contradicting ground truth, correct feedback can lower the weight.
    pub fn apply_feedback(&mut self, is_correct: bool, ground_truth: Option<bool>) {
        let before = self.weight;
        self.nudge(is_correct);
        self.update_reliability(is_correct, ground_truth.unwrap_or(is_correct));

        debug!(
            analyzer = %self.id,
            before,
            after = self.weight,
            is_correct,
            "reliability updated"
        );
    }
}

impl fmt::Debug for LocalAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalAnalyzer")
            .field("id", &self.id)
            .field("specialization", &self.specialization)
            .field("weight", &self.weight)
            .field("window", &self.window)
            .finish()
    }
}
