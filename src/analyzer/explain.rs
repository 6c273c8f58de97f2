//! Explanation building for a single analyzer verdict.

use crate::analyzer::features::{orbital_distance_au, FeatureVector};
use crate::models::{AnalyzerExplanation, Observation, Specialization};
use std::collections::BTreeMap;

/// Transit depth above which a dip counts as significant.
const SIGNIFICANT_DEPTH: f64 = 0.001;

/// Reasoning bucket for a prediction.
pub fn prediction_reasoning(prediction: f64) -> &'static str {
    if prediction > 0.7 {
        "Strong exoplanet candidate - multiple indicators align with planetary signals"
    } else if prediction > 0.5 {
        "Potential exoplanet - some indicators present but require validation"
    } else if prediction > 0.3 {
        "Weak candidate - signal present but likely false positive"
    } else {
        "Not an exoplanet - signal characteristics inconsistent with planetary transit"
    }
}

/// Normalize raw attribution scores into importances summing to 1.
///
/// Scores are taken by magnitude. When every score is zero (or the input
/// is empty but names are known) importance is spread uniformly over
/// `names`.
pub fn normalize_attribution(
    raw: &BTreeMap<String, f64>,
    names: &[String],
) -> BTreeMap<String, f64> {
    let total: f64 = raw
        .values()
        .map(|v| v.abs())
        .filter(|v| v.is_finite())
        .sum();

    if total > 0.0 {
        return raw
            .iter()
            .map(|(name, v)| {
                let v = if v.is_finite() { v.abs() } else { 0.0 };
                (name.clone(), v / total)
            })
            .collect();
    }

    let keys: Vec<&String> = if raw.is_empty() {
        names.iter().collect()
    } else {
        raw.keys().collect()
    };

    if keys.is_empty() {
        return BTreeMap::new();
    }

    let share = 1.0 / keys.len() as f64;
    keys.into_iter().map(|k| (k.clone(), share)).collect()
}

/// Domain remarks derived directly from the measurements.
pub fn scientific_analysis(observation: &Observation) -> BTreeMap<String, String> {
    let mut analysis = BTreeMap::new();

    if let (Some(_), Some(depth)) = (observation.get("period"), observation.get("depth")) {
        let text = if depth > SIGNIFICANT_DEPTH {
            format!("Transit depth of {:.4} suggests planetary candidate", depth)
        } else {
            "Transit depth too shallow for reliable detection".to_string()
        };
        analysis.insert("transit_method".to_string(), text);
    }

    if let (Some(mass), Some(period)) = (observation.get("stellar_mass"), observation.get("period"))
    {
        analysis.insert(
            "orbital_analysis".to_string(),
            format!("Orbital distance: {:.2} AU", orbital_distance_au(mass, period)),
        );
    }

    analysis
}

/// Remarks on signal quality.
pub fn confidence_analysis(features: &FeatureVector) -> BTreeMap<String, String> {
    let snr = features.signal_to_noise();
    let text = if snr > 10.0 {
        "High signal-to-noise ratio - reliable detection"
    } else if snr > 5.0 {
        "Moderate signal quality - good candidate"
    } else {
        "Low signal quality - requires careful validation"
    };

    let mut analysis = BTreeMap::new();
    analysis.insert("signal_quality".to_string(), text.to_string());
    analysis
}

/// Note describing what the analyzer focuses on.
pub fn specialization_note(specialization: &Specialization) -> String {
    match specialization {
        Specialization::Transit => {
            "Specialized in transit photometry - focused on period, depth, and duration analysis"
                .to_string()
        }
        Specialization::RadialVelocity => {
            "Specialized in radial velocity - analyzing stellar wobble and orbital mechanics"
                .to_string()
        }
        Specialization::Imaging => {
            "Specialized in direct imaging - analyzing stellar separation and brightness contrast"
                .to_string()
        }
        Specialization::General => {
            "General purpose exoplanet detection - analyzing all available indicators".to_string()
        }
        Specialization::Other(tag) => format!("Custom specialization '{}'", tag),
    }
}

/// Assemble the full explanation for one verdict.
pub fn build_explanation(
    observation: &Observation,
    prediction: f64,
    attribution: &BTreeMap<String, f64>,
    feature_names: &[String],
    specialization: &Specialization,
) -> AnalyzerExplanation {
    let features = FeatureVector::extract(observation);

    AnalyzerExplanation {
        reasoning: prediction_reasoning(prediction).to_string(),
        key_factors: normalize_attribution(attribution, feature_names),
        scientific_analysis: scientific_analysis(observation),
        confidence_factors: confidence_analysis(&features),
        specialization_note: specialization_note(specialization),
    }
}
