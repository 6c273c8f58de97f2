//! The aggregation engine: analyzer registry, history and feedback.

use crate::analyzer::{BaselineScorer, LocalAnalyzer, ScoringTask};
use crate::engine::aggregate::{self, consensus_strength, Weighted};
use crate::engine::ledger::{FeedbackLedger, History};
use crate::error::{EngineError, Result};
use crate::models::{
    AggregatedVerdict, AnalysisRecord, AnalyzerStats, AnalyzerVerdict, Exclusion, FeedbackEntry,
    Observation, Specialization, SystemStatus,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of recent analyses reported in the consensus trend.
pub const CONSENSUS_TREND_LEN: usize = 10;

/// What to do when feedback arrives for a sequence id that already has some.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatFeedback {
    /// Apply it again; weight updates compound.
    #[default]
    Compound,
    /// Fail with [`EngineError::DuplicateFeedback`] and change nothing.
    Reject,
}

/// Owns the analyzers, the analysis history and the feedback ledger.
///
/// Analyzers live in a registration-ordered arena indexed by id.
#[derive(Debug, Default)]
pub struct AggregationEngine {
    analyzers: Vec<LocalAnalyzer>,
    index: HashMap<String, usize>,
    history: History,
    ledger: FeedbackLedger,
    repeat_feedback: RepeatFeedback,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the repeated-feedback policy.
    pub fn with_repeat_feedback(mut self, policy: RepeatFeedback) -> Self {
        self.repeat_feedback = policy;
        self
    }

    pub fn repeat_feedback(&self) -> RepeatFeedback {
        self.repeat_feedback
    }

    /// Register an analyzer. Ids must be unique.
    pub fn register(&mut self, analyzer: LocalAnalyzer) -> Result<()> {
        if self.index.contains_key(analyzer.id()) {
            return Err(EngineError::DuplicateAnalyzer(analyzer.id().to_string()));
        }

        info!(
            "Added analyzer: {} (specialization: {})",
            analyzer.id(),
            analyzer.specialization()
        );
        self.index.insert(analyzer.id().to_string(), self.analyzers.len());
        self.analyzers.push(analyzer);
        Ok(())
    }

    /// Register an analyzer backed by the statistical baseline scorer.
    pub fn register_analyzer(
        &mut self,
        id: impl Into<String>,
        specialization: Specialization,
    ) -> Result<()> {
        let scorer = Arc::new(BaselineScorer::new(specialization.clone()));
        self.register(LocalAnalyzer::new(id, specialization, scorer))
    }

    /// Analyzers in registration order.
    pub fn analyzers(&self) -> &[LocalAnalyzer] {
        &self.analyzers
    }

    pub fn analyzer(&self, id: &str) -> Option<&LocalAnalyzer> {
        self.index.get(id).map(|&i| &self.analyzers[i])
    }

    /// Detached scoring handles in registration order.
    pub fn scoring_tasks(&self) -> Vec<ScoringTask> {
        self.analyzers.iter().map(|a| a.scoring_task()).collect()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn ledger(&self) -> &FeedbackLedger {
        &self.ledger
    }

    pub fn record(&self, sequence_id: u64) -> Option<&AnalysisRecord> {
        self.history.get(sequence_id)
    }

    /// Score the observation with every analyzer and record the combined
    /// verdict. A failing analyzer is excluded, never fatal.
    pub fn analyze(&mut self, observation: &Observation) -> AggregatedVerdict {
        info!("Analyzing candidate: {}", observation.label());

        let mut verdicts = Vec::with_capacity(self.analyzers.len());
        let mut exclusions = Vec::new();

        for analyzer in &self.analyzers {
            match analyzer.score(observation) {
                Ok(verdict) => verdicts.push(verdict),
                Err(e) => {
                    warn!("Excluding analyzer {}: {}", analyzer.id(), e);
                    exclusions.push(Exclusion {
                        analyzer_id: analyzer.id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.commit(observation.clone(), verdicts, exclusions)
    }

    /// Aggregate already-computed verdicts with the current weights and
    /// append the record. Verdicts from unregistered ids are dropped.
    pub(crate) fn commit(
        &mut self,
        observation: Observation,
        verdicts: Vec<AnalyzerVerdict>,
        exclusions: Vec<Exclusion>,
    ) -> AggregatedVerdict {
        let sequence_id = self.history.next_sequence_id();

        let verdicts: Vec<AnalyzerVerdict> = verdicts
            .into_iter()
            .filter(|v| self.index.contains_key(&v.analyzer_id))
            .collect();

        let weighted: Vec<Weighted<'_>> = verdicts
            .iter()
            .map(|v| Weighted {
                verdict: v,
                weight: self.analyzers[self.index[&v.analyzer_id]].weight(),
            })
            .collect();

        let aggregated = aggregate::combine(sequence_id, &weighted, exclusions);

        debug!(
            sequence_id,
            prediction = aggregated.prediction,
            confidence = aggregated.confidence,
            consensus = aggregated.consensus_strength,
            participants = verdicts.len(),
            "aggregated verdict"
        );

        self.history.push(AnalysisRecord {
            sequence_id,
            timestamp: Utc::now(),
            observation,
            verdicts,
            aggregated: aggregated.clone(),
        });

        aggregated
    }

    /// Apply human feedback to every analyzer that took part in the
    /// referenced analysis.
    ///
    /// Each analyzer receives the two-step update of
    /// [`LocalAnalyzer::apply_feedback`].
    pub fn submit_feedback(
        &mut self,
        sequence_id: u64,
        is_correct: bool,
        ground_truth: Option<bool>,
    ) -> Result<()> {
        let record = self
            .history
            .get(sequence_id)
            .ok_or_else(|| error_unknown(sequence_id, self.history.len()))?;

        if self.repeat_feedback == RepeatFeedback::Reject && self.ledger.contains(sequence_id) {
            warn!("Rejecting repeated feedback for analysis {}", sequence_id);
            return Err(EngineError::DuplicateFeedback(sequence_id));
        }

        let prediction = record.aggregated.prediction;
        let participants: Vec<usize> = record
            .verdicts
            .iter()
            .filter_map(|v| self.index.get(&v.analyzer_id).copied())
            .collect();

        self.ledger.append(FeedbackEntry {
            timestamp: Utc::now(),
            sequence_id,
            human_verdict: is_correct,
            ground_truth,
            prediction,
        });

        for i in participants {
            self.analyzers[i].apply_feedback(is_correct, ground_truth);
        }

        info!(
            "Updated analyzer weights based on feedback. Analysis {} marked as {}",
            sequence_id,
            if is_correct { "correct" } else { "incorrect" }
        );
        Ok(())
    }

    /// Derived view of the current state.
    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            total_analyses: self.history.len(),
            total_feedback: self.ledger.len(),
            system_accuracy: self.ledger.accuracy(),
            analyzer_count: self.analyzers.len(),
            analyzers: self
                .analyzers
                .iter()
                .map(|a| AnalyzerStats {
                    analyzer_id: a.id().to_string(),
                    reliability_weight: a.weight(),
                    specialization: a.specialization().clone(),
                    sample_count: a.sample_count(),
                    recent_accuracy: a.recent_accuracy(),
                })
                .collect(),
            consensus_trend: self
                .history
                .recent(CONSENSUS_TREND_LEN)
                .iter()
                .map(|r| consensus_strength(&r.predictions()))
                .collect(),
        }
    }
}

fn error_unknown(sequence_id: u64, history_len: usize) -> EngineError {
    warn!("Invalid analysis ID: {}", sequence_id);
    EngineError::UnknownSequence {
        sequence_id,
        history_len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{FnScorer, MAX_WEIGHT, MIN_WEIGHT};
    use crate::error::ScorerError;

    fn stub(id: &str, prediction: f64) -> LocalAnalyzer {
        LocalAnalyzer::new(
            id,
            Specialization::General,
            Arc::new(FnScorer::constant(prediction)),
        )
    }

    fn engine_with(predictions: &[(&str, f64)]) -> AggregationEngine {
        let mut engine = AggregationEngine::new();
        for (id, p) in predictions {
            engine.register(stub(id, *p)).unwrap();
        }
        engine
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_duplicate_registration() {
        let mut engine = AggregationEngine::new();
        engine
            .register_analyzer("transit", Specialization::Transit)
            .unwrap();
        let err = engine
            .register_analyzer("transit", Specialization::Imaging)
            .unwrap_err();

        assert_eq!(err, EngineError::DuplicateAnalyzer("transit".to_string()));
        assert_eq!(engine.analyzers().len(), 1);
        assert_eq!(
            engine.analyzer("transit").unwrap().specialization(),
            &Specialization::Transit
        );
    }

    #[test]
    fn test_analyze_two_analyzers() {
        let mut engine = engine_with(&[("low", 0.2), ("high", 0.8)]);
        let verdict = engine.analyze(&Observation::new());

        assert_eq!(verdict.sequence_id, 0);
        assert!(close(verdict.prediction, 0.5));
        assert!(close(verdict.consensus_strength, 0.4));
        assert_eq!(verdict.analyzers.len(), 2);
        assert_eq!(verdict.analyzers[0].analyzer_id, "low");
    }

    #[test]
    fn test_sequence_ids_increase() {
        let mut engine = engine_with(&[("a", 0.6)]);
        let ids: Vec<u64> = (0..5)
            .map(|_| engine.analyze(&Observation::new()).sequence_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(engine.record(4).unwrap().sequence_id, 4);
    }

    #[test]
    fn test_single_analyzer_consensus() {
        let mut engine = engine_with(&[("solo", 0.1)]);
        let verdict = engine.analyze(&Observation::new());
        assert_eq!(verdict.consensus_strength, 1.0);
        assert!(close(verdict.prediction, 0.1));
    }

    #[test]
    fn test_failing_analyzer_is_excluded() {
        let mut engine = engine_with(&[("good", 0.9)]);
        engine
            .register(LocalAnalyzer::new(
                "broken",
                Specialization::General,
                Arc::new(FnScorer::new(|_| {
                    Err(ScorerError::Failed("model offline".into()))
                })),
            ))
            .unwrap();

        let verdict = engine.analyze(&Observation::new());
        assert!(close(verdict.prediction, 0.9));
        assert_eq!(verdict.exclusions.len(), 1);
        assert_eq!(verdict.exclusions[0].analyzer_id, "broken");
        assert!(verdict.exclusions[0].reason.contains("model offline"));

        // Excluded analyzers receive no feedback.
        engine.submit_feedback(0, true, None).unwrap();
        assert_eq!(engine.analyzer("broken").unwrap().sample_count(), 0);
        assert_eq!(engine.analyzer("good").unwrap().sample_count(), 1);
    }

    #[test]
    fn test_empty_registry_still_records() {
        let mut engine = AggregationEngine::new();
        let verdict = engine.analyze(&Observation::new());
        assert_eq!(verdict.prediction, 0.5);
        assert_eq!(engine.status().total_analyses, 1);
    }

    #[test]
    fn test_unknown_sequence() {
        let mut engine = engine_with(&[("a", 0.5)]);
        engine.analyze(&Observation::new());

        let err = engine.submit_feedback(1, true, None).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownSequence {
                sequence_id: 1,
                history_len: 1
            }
        );
        assert_eq!(engine.status().total_feedback, 0);
    }

    #[test]
    fn test_feedback_two_step_formula() {
        let mut engine = engine_with(&[("a", 0.9), ("b", 0.2)]);
        engine.analyze(&Observation::new());

        engine.submit_feedback(0, true, None).unwrap();
        // 0.8 * (1.0 * 1.05) + 0.2 * 1.0
        assert!(close(engine.analyzer("a").unwrap().weight(), 1.04));
        assert!(close(engine.analyzer("b").unwrap().weight(), 1.04));
    }

    #[test]
    fn test_repeated_feedback_compounds_by_default() {
        let mut engine = engine_with(&[("a", 0.9)]);
        engine.analyze(&Observation::new());

        engine.submit_feedback(0, true, None).unwrap();
        engine.submit_feedback(0, true, None).unwrap();

        // second round: 0.8 * (1.04 * 1.05) + 0.2 * 1.0
        assert!(close(engine.analyzer("a").unwrap().weight(), 1.0736));
        assert_eq!(engine.status().total_feedback, 2);
    }

    #[test]
    fn test_repeated_feedback_rejected_when_configured() {
        let mut engine =
            engine_with(&[("a", 0.9)]).with_repeat_feedback(RepeatFeedback::Reject);
        engine.analyze(&Observation::new());

        engine.submit_feedback(0, true, None).unwrap();
        let err = engine.submit_feedback(0, false, None).unwrap_err();

        assert_eq!(err, EngineError::DuplicateFeedback(0));
        assert!(close(engine.analyzer("a").unwrap().weight(), 1.04));
        assert_eq!(engine.status().total_feedback, 1);
    }

    #[test]
    fn test_record_keeps_weights_from_aggregation_time() {
        let mut engine = engine_with(&[("a", 0.9), ("b", 0.1)]);
        let first = engine.analyze(&Observation::new());
        engine.submit_feedback(0, false, Some(true)).unwrap();

        let stored = &engine.record(0).unwrap().aggregated;
        assert_eq!(stored, &first);
        assert_eq!(stored.weight_of("a"), Some(1.0));
        assert!(engine.analyzer("a").unwrap().weight() < 1.0);
    }

    #[test]
    fn test_weights_stay_in_bounds() {
        let mut engine = engine_with(&[("a", 0.9)]);
        engine.analyze(&Observation::new());
        for i in 0..300 {
            engine.submit_feedback(0, i % 3 == 0, Some(i % 2 == 0)).unwrap();
            let w = engine.analyzer("a").unwrap().weight();
            assert!((MIN_WEIGHT..=MAX_WEIGHT).contains(&w));
        }
    }

    #[test]
    fn test_status() {
        let mut engine = engine_with(&[("a", 0.9), ("b", 0.1)]);
        for _ in 0..12 {
            engine.analyze(&Observation::new());
        }
        engine.submit_feedback(0, true, None).unwrap();
        engine.submit_feedback(1, false, None).unwrap();
        engine.submit_feedback(2, true, None).unwrap();

        let status = engine.status();
        assert_eq!(status.total_analyses, 12);
        assert_eq!(status.total_feedback, 3);
        assert!(close(status.system_accuracy, 2.0 / 3.0));
        assert_eq!(status.analyzer_count, 2);
        assert_eq!(status.analyzers[0].sample_count, 3);
        assert_eq!(status.consensus_trend.len(), CONSENSUS_TREND_LEN);
        assert!(close(status.consensus_trend[0], 0.2));
    }
}
