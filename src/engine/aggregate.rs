//! Weighted combination of analyzer verdicts.
//!
//! Pure functions over verdicts paired with the weights read at
//! aggregation time. Nothing here touches engine state.

use crate::models::{
    AggregatedExplanation, AggregatedVerdict, AnalyzerSnapshot, AnalyzerVerdict, Exclusion,
};
use std::collections::BTreeMap;

/// Prediction used when no weight is available.
pub const NEUTRAL_PREDICTION: f64 = 0.5;

/// A verdict paired with its analyzer's weight.
#[derive(Debug, Clone, Copy)]
pub struct Weighted<'a> {
    pub verdict: &'a AnalyzerVerdict,
    pub weight: f64,
}

fn total_weight(inputs: &[Weighted<'_>]) -> f64 {
    inputs.iter().map(|w| w.weight).sum()
}

/// Σ(wᵢ·pᵢ) / Σ(wᵢ), or 0.5 when the total weight is zero.
pub fn weighted_prediction(inputs: &[Weighted<'_>]) -> f64 {
    let total = total_weight(inputs);
    if total <= 0.0 {
        return NEUTRAL_PREDICTION;
    }

    let mean = inputs
        .iter()
        .map(|w| w.weight * w.verdict.prediction)
        .sum::<f64>()
        / total;

    // Keep rounding from pushing the mean outside the observed range.
    let (lo, hi) = inputs.iter().fold((f64::MAX, f64::MIN), |(lo, hi), w| {
        (lo.min(w.verdict.prediction), hi.max(w.verdict.prediction))
    });
    mean.clamp(lo, hi)
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Agreement among predictions: `max(0, 1 − 2·σ)`, 1.0 for fewer than two.
pub fn consensus_strength(predictions: &[f64]) -> f64 {
    // Identical predictions are exact agreement, regardless of rounding in σ.
    if predictions.len() < 2 || predictions.iter().all(|p| *p == predictions[0]) {
        return 1.0;
    }
    (1.0 - 2.0 * std_dev(predictions)).max(0.0)
}

/// Weighted mean confidence scaled by `0.7 + 0.3·consensus`, capped at 1.
pub fn aggregate_confidence(inputs: &[Weighted<'_>], consensus: f64) -> f64 {
    let total = total_weight(inputs);
    if total <= 0.0 {
        return 0.0;
    }

    let weighted = inputs
        .iter()
        .map(|w| w.weight * w.verdict.confidence)
        .sum::<f64>()
        / total;

    (weighted * (0.7 + 0.3 * consensus)).min(1.0)
}

/// Reasoning string with the largest weight sum; ties go to the first seen.
pub fn primary_reasoning(inputs: &[Weighted<'_>]) -> Option<String> {
    let mut votes: Vec<(&str, f64)> = Vec::new();

    for input in inputs {
        let reasoning = input.verdict.explanation.reasoning.as_str();
        match votes.iter_mut().find(|(r, _)| *r == reasoning) {
            Some((_, total)) => *total += input.weight,
            None => votes.push((reasoning, input.weight)),
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for (reasoning, total) in votes {
        if best.map_or(true, |(_, top)| total > top) {
            best = Some((reasoning, total));
        }
    }

    best.map(|(reasoning, _)| reasoning.to_string())
}

/// Average per-factor importance with weights normalized to sum 1.
pub fn aggregate_factors(inputs: &[Weighted<'_>]) -> BTreeMap<String, f64> {
    let mut factors = BTreeMap::new();
    let total = total_weight(inputs);
    if total <= 0.0 {
        return factors;
    }

    for input in inputs {
        let share = input.weight / total;
        for (factor, importance) in &input.verdict.explanation.key_factors {
            *factors.entry(factor.clone()).or_insert(0.0) += share * importance;
        }
    }

    factors
}

/// Merge every analyzer's explanation.
pub fn aggregate_explanations(inputs: &[Weighted<'_>]) -> AggregatedExplanation {
    let mut individual_analyses = BTreeMap::new();
    let mut specialization_insights = BTreeMap::new();
    let mut remarks: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for input in inputs {
        let verdict = input.verdict;
        individual_analyses.insert(
            verdict.analyzer_id.clone(),
            verdict.explanation.scientific_analysis.clone(),
        );
        specialization_insights.insert(
            verdict.analyzer_id.clone(),
            verdict.explanation.specialization_note.clone(),
        );
        for (factor, text) in &verdict.explanation.confidence_factors {
            remarks
                .entry(factor.clone())
                .or_default()
                .push(format!("{}: {}", verdict.analyzer_id, text));
        }
    }

    AggregatedExplanation {
        primary_reasoning: primary_reasoning(inputs),
        aggregated_factors: aggregate_factors(inputs),
        individual_analyses,
        confidence_consensus: remarks
            .into_iter()
            .map(|(factor, texts)| (factor, texts.join("; ")))
            .collect(),
        specialization_insights,
    }
}

/// Combine weighted verdicts into one aggregated verdict.
pub fn combine(
    sequence_id: u64,
    inputs: &[Weighted<'_>],
    exclusions: Vec<Exclusion>,
) -> AggregatedVerdict {
    let predictions: Vec<f64> = inputs.iter().map(|w| w.verdict.prediction).collect();
    let consensus = consensus_strength(&predictions);

    AggregatedVerdict {
        sequence_id,
        prediction: weighted_prediction(inputs),
        confidence: aggregate_confidence(inputs, consensus),
        consensus_strength: consensus,
        explanation: aggregate_explanations(inputs),
        analyzers: inputs
            .iter()
            .map(|w| AnalyzerSnapshot {
                analyzer_id: w.verdict.analyzer_id.clone(),
                prediction: w.verdict.prediction,
                confidence: w.verdict.confidence,
                weight: w.weight,
            })
            .collect(),
        exclusions,
    }
}
