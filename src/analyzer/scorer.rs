//! Scoring capabilities injected into analyzers.
//!
//! The engine treats a scorer as opaque: one call from observation to a
//! prediction plus a per-feature attribution. Two implementations ship
//! here, a deterministic statistical baseline and a closure adapter.

use crate::analyzer::features::{feature_names, FeatureVector, FEATURE_COUNT};
use crate::error::ScorerError;
use crate::models::{Observation, Specialization};
use std::collections::BTreeMap;
use std::fmt;

/// Raw output of a scorer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreOutput {
    /// Probability in [0, 1].
    pub prediction: f64,
    /// Signed contribution per feature. Normalized by the analyzer.
    pub attribution: BTreeMap<String, f64>,
}

impl ScoreOutput {
    /// Output without attribution.
    pub fn new(prediction: f64) -> Self {
        Self {
            prediction,
            attribution: BTreeMap::new(),
        }
    }
}

/// A scoring capability: observation in, prediction out.
pub trait Scorer: Send + Sync {
    /// Score one observation.
    fn score(&self, observation: &Observation) -> Result<ScoreOutput, ScorerError>;

    /// Names of the features this scorer reads.
    fn feature_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Per-feature emphasis for each specialization, in feature order.
fn emphasis(specialization: &Specialization) -> [f64; FEATURE_COUNT] {
    //       per  dep  dur  mass rad  temp dist rr   logp snr
    match specialization {
        Specialization::Transit => [1.0, 1.5, 1.5, 0.5, 0.5, 0.5, 0.5, 1.5, 1.0, 1.5],
        Specialization::RadialVelocity => [1.5, 0.5, 0.5, 1.5, 1.0, 0.5, 1.5, 0.5, 1.5, 1.0],
        Specialization::Imaging => [0.5, 0.5, 0.5, 1.0, 1.5, 1.5, 1.5, 1.0, 0.5, 1.0],
        Specialization::General | Specialization::Other(_) => [1.0; FEATURE_COUNT],
    }
}

/// Deterministic logistic baseline over the ten derived features.
///
/// Each feature maps to a plausibility term; the terms are scaled by the
/// specialization emphasis, summed with a bias and squashed by a sigmoid.
/// The scaled terms double as the attribution.
#[derive(Clone)]
pub struct BaselineScorer {
    specialization: Specialization,
    bias: f64,
}

impl BaselineScorer {
    pub fn new(specialization: Specialization) -> Self {
        Self {
            specialization,
            bias: -0.5,
        }
    }

    /// Unscaled plausibility terms, in feature order.
    fn terms(features: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let [period, depth, duration, mass, radius, temperature, distance, ratio, log_period, snr] =
            *features.values();

        let period_term = if period > 0.0 { 0.1 } else { 0.0 };
        let depth_term = if depth > 0.001 { 0.3 } else { 0.0 };
        let duration_term = match duration {
            d if d <= 0.0 => 0.0,
            d if d <= 24.0 => 0.2,
            _ => -0.3,
        };
        let mass_term = -0.2 * (mass - 1.0).abs().min(5.0);
        let radius_term = -0.2 * (radius - 1.0).abs().min(5.0);
        let temperature_term = -0.5 * ((temperature - 5777.0).abs() / 5777.0).min(2.0);
        let distance_term = if distance > 0.0 && distance < 5.0 {
            0.1
        } else {
            0.0
        };
        // Ratios above ~0.3 point at stellar companions rather than planets.
        let ratio_term = if ratio > 0.3 {
            -4.0 * (ratio - 0.3)
        } else {
            0.5 * (ratio / 0.1).min(1.0)
        };
        let log_period_term = match log_period {
            lp if lp == 0.0 => 0.0,
            lp if (-0.3..=2.7).contains(&lp) => 0.3,
            _ => -0.5,
        };
        let snr_term = (0.5 * snr.max(0.0).ln_1p()).min(1.5);

        [
            period_term,
            depth_term,
            duration_term,
            mass_term,
            radius_term,
            temperature_term,
            distance_term,
            ratio_term,
            log_period_term,
            snr_term,
        ]
    }
}

impl fmt::Debug for BaselineScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaselineScorer")
            .field("specialization", &self.specialization)
            .finish()
    }
}

impl Scorer for BaselineScorer {
    fn score(&self, observation: &Observation) -> Result<ScoreOutput, ScorerError> {
        let features = FeatureVector::extract(observation);
        let emphasis = emphasis(&self.specialization);

        let mut logit = self.bias;
        let mut attribution = BTreeMap::new();

        for ((name, _), (term, scale)) in features
            .iter()
            .zip(Self::terms(&features).iter().zip(emphasis.iter()))
        {
            let contribution = term * scale;
            logit += contribution;
            attribution.insert(name.to_string(), contribution);
        }

        if !logit.is_finite() {
            return Err(ScorerError::Failed(format!(
                "non-finite score for {}",
                observation.label()
            )));
        }

        Ok(ScoreOutput {
            prediction: 1.0 / (1.0 + (-logit).exp()),
            attribution,
        })
    }

    fn feature_names(&self) -> Vec<String> {
        feature_names()
    }
}

type ScoreFn = dyn Fn(&Observation) -> Result<ScoreOutput, ScorerError> + Send + Sync;

/// Adapter turning a closure into a [`Scorer`].
pub struct FnScorer {
    func: Box<ScoreFn>,
    names: Vec<String>,
}

impl FnScorer {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Observation) -> Result<ScoreOutput, ScorerError> + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
            names: Vec::new(),
        }
    }

    /// Scorer that always returns `prediction`.
    pub fn constant(prediction: f64) -> Self {
        Self::new(move |_| Ok(ScoreOutput::new(prediction)))
    }

    /// Declare the feature names reported with each verdict.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }
}

impl fmt::Debug for FnScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnScorer").field("names", &self.names).finish()
    }
}

impl Scorer for FnScorer {
    fn score(&self, observation: &Observation) -> Result<ScoreOutput, ScorerError> {
        (self.func)(observation)
    }

    fn feature_names(&self) -> Vec<String> {
        self.names.clone()
    }
}
