use federated_verdict::analyzer::{FnScorer, LocalAnalyzer, MAX_WEIGHT, MIN_WEIGHT};
use federated_verdict::config::Config;
use federated_verdict::engine::AggregationEngine;
use federated_verdict::models::{Observation, Specialization};
use federated_verdict::session::build_engine;
use proptest::prelude::*;
use std::sync::Arc;

const TOLERANCE: f64 = 1e-12;

fn constant_engine(predictions: &[f64]) -> AggregationEngine {
    let mut engine = AggregationEngine::new();
    for (i, &p) in predictions.iter().enumerate() {
        engine
            .register(LocalAnalyzer::new(
                format!("analyzer_{}", i),
                Specialization::General,
                Arc::new(FnScorer::constant(p)),
            ))
            .unwrap();
    }
    engine
}

fn weights(engine: &AggregationEngine) -> Vec<f64> {
    engine.analyzers().iter().map(|a| a.weight()).collect()
}

fn arb_observation() -> impl Strategy<Value = Observation> {
    (
        0.1f64..1000.0,
        0.0f64..0.05,
        0.0001f64..0.01,
        prop::option::of(0.1f64..3.0),
        prop::option::of(2500.0f64..9000.0),
    )
        .prop_map(|(period, depth, noise, mass, temperature)| {
            let mut observation = Observation::new()
                .with("period", period)
                .with("depth", depth)
                .with("noise", noise);
            if let Some(mass) = mass {
                observation = observation.with("stellar_mass", mass);
            }
            if let Some(temperature) = temperature {
                observation = observation.with("temperature", temperature);
            }
            observation
        })
}

// ── Aggregated prediction stays between the extremes ────────────────────

proptest! {
    #[test]
    fn prediction_within_member_range(
        predictions in prop::collection::vec(0.0f64..=1.0, 1..8),
        feedback in prop::collection::vec(any::<bool>(), 0..6),
    ) {
        let mut engine = constant_engine(&predictions);
        let first = engine.analyze(&Observation::new());
        for is_correct in feedback {
            engine.submit_feedback(first.sequence_id, is_correct, None).unwrap();
        }

        let verdict = engine.analyze(&Observation::new());
        let min = predictions.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = predictions.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        prop_assert!(verdict.prediction >= min && verdict.prediction <= max,
            "{} outside [{}, {}]", verdict.prediction, min, max);
    }

    #[test]
    fn baseline_prediction_within_member_range(observation in arb_observation()) {
        let mut engine = build_engine(&Config::default()).unwrap();
        let verdict = engine.analyze(&observation);
        let record = engine.record(verdict.sequence_id).unwrap();

        let predictions = record.predictions();
        prop_assert_eq!(predictions.len(), 4);
        let min = predictions.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = predictions.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(verdict.prediction >= min && verdict.prediction <= max);
        prop_assert!((0.0..=1.0).contains(&verdict.confidence));
        prop_assert!((0.0..=1.0).contains(&verdict.consensus_strength));
    }
}

// ── Consensus is exact for unanimous panels ────────────────────────────

proptest! {
    #[test]
    fn single_analyzer_has_full_consensus(p in 0.0f64..=1.0) {
        let mut engine = constant_engine(&[p]);
        prop_assert_eq!(engine.analyze(&Observation::new()).consensus_strength, 1.0);
    }

    #[test]
    fn identical_predictions_have_full_consensus(p in 0.0f64..=1.0, n in 2usize..10) {
        let mut engine = constant_engine(&vec![p; n]);
        let verdict = engine.analyze(&Observation::new());
        prop_assert_eq!(verdict.consensus_strength, 1.0);
        prop_assert!((verdict.prediction - p).abs() < TOLERANCE);
    }
}

// ── Reliability weight bounds and direction ────────────────────────────

proptest! {
    #[test]
    fn weights_stay_in_bounds(
        feedback in prop::collection::vec((any::<bool>(), prop::option::of(any::<bool>())), 0..60),
    ) {
        let mut engine = constant_engine(&[0.2, 0.6, 0.9]);
        let sequence_id = engine.analyze(&Observation::new()).sequence_id;

        for (is_correct, ground_truth) in feedback {
            engine.submit_feedback(sequence_id, is_correct, ground_truth).unwrap();
            for w in weights(&engine) {
                prop_assert!((MIN_WEIGHT..=MAX_WEIGHT).contains(&w), "weight {} out of bounds", w);
            }
        }
    }

    // Holds only while no feedback ever carried a ground truth.
    #[test]
    fn feedback_moves_weights_in_its_direction(
        feedback in prop::collection::vec(any::<bool>(), 1..60),
    ) {
        let mut engine = constant_engine(&[0.3, 0.7]);
        let sequence_id = engine.analyze(&Observation::new()).sequence_id;

        for is_correct in feedback {
            let before = weights(&engine);
            engine.submit_feedback(sequence_id, is_correct, None).unwrap();
            let after = weights(&engine);

            for (b, a) in before.iter().zip(&after) {
                if is_correct {
                    prop_assert!(*a >= b - TOLERANCE, "correct feedback lowered {} to {}", b, a);
                } else {
                    prop_assert!(*a <= b + TOLERANCE, "incorrect feedback raised {} to {}", b, a);
                }
            }
        }
    }
}

// ── Status counts every call ───────────────────────────────────────────

proptest! {
    #[test]
    fn status_counts_match_calls(
        ops in prop::collection::vec((any::<bool>(), any::<usize>(), any::<bool>()), 0..40),
    ) {
        let mut engine = constant_engine(&[0.4, 0.8]);
        let mut analyses = 0;
        let mut feedback = 0;

        for (analyze, pick, is_correct) in ops {
            if analyze || analyses == 0 {
                engine.analyze(&Observation::new());
                analyses += 1;
            } else {
                let sequence_id = (pick % analyses) as u64;
                engine.submit_feedback(sequence_id, is_correct, None).unwrap();
                feedback += 1;
            }
        }

        let status = engine.status();
        prop_assert_eq!(status.total_analyses, analyses);
        prop_assert_eq!(status.total_feedback, feedback);
        prop_assert!(status.consensus_trend.len() <= 10);
        prop_assert_eq!(status.consensus_trend.len(), analyses.min(10));
    }
}
