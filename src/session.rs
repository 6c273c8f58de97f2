//! Session scripts: the JSON integration boundary.
//!
//! A session is an ordered list of steps replayed against one engine:
//!
//! ```json
//! {"steps": [
//!   {"step": "analyze", "observation": {"star_id": "Kepler-452", "period": 384.8}},
//!   {"step": "feedback", "sequence_id": 0, "is_correct": true, "ground_truth": true},
//!   {"step": "status"}
//! ]}
//! ```

use crate::config::Config;
use crate::engine::{AggregationEngine, SharedEngine};
use crate::models::{AggregatedVerdict, Observation, SystemStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// One step of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SessionStep {
    Analyze {
        observation: Observation,
    },
    Feedback {
        sequence_id: u64,
        is_correct: bool,
        #[serde(default)]
        ground_truth: Option<bool>,
    },
    Status,
}

/// A parsed session file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub steps: Vec<SessionStep>,
}

impl Session {
    /// Load a session from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", path.display()))
    }

    /// Number of analyze steps.
    pub fn analysis_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, SessionStep::Analyze { .. }))
            .count()
    }
}

/// Result of replaying one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepOutcome {
    Analyze {
        observation: Observation,
        verdict: AggregatedVerdict,
    },
    Feedback {
        sequence_id: u64,
        is_correct: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        ground_truth: Option<bool>,
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Status {
        status: SystemStatus,
    },
}

/// Metadata about a replayed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetadata {
    pub session: String,
    pub generated_at: DateTime<Utc>,
    pub analyzers: Vec<String>,
    pub concurrent: bool,
    pub duration_seconds: f64,
}

/// Everything a report needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub metadata: SessionMetadata,
    pub outcomes: Vec<StepOutcome>,
    pub final_status: SystemStatus,
}

impl SessionReport {
    /// Analyze outcomes in order.
    pub fn verdicts(&self) -> impl Iterator<Item = (&Observation, &AggregatedVerdict)> {
        self.outcomes.iter().filter_map(|o| match o {
            StepOutcome::Analyze {
                observation,
                verdict,
            } => Some((observation, verdict)),
            _ => None,
        })
    }

    /// Number of feedback steps the engine refused.
    pub fn rejected_feedback(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, StepOutcome::Feedback { accepted: false, .. }))
            .count()
    }
}

/// Build an engine with the configured analyzers and feedback policy.
pub fn build_engine(config: &Config) -> Result<AggregationEngine> {
    let mut engine = AggregationEngine::new().with_repeat_feedback(config.feedback.repeat);

    for analyzer in &config.analyzers {
        engine
            .register_analyzer(analyzer.id.clone(), analyzer.specialization.clone())
            .with_context(|| format!("Invalid analyzer configuration for '{}'", analyzer.id))?;
    }

    Ok(engine)
}

fn feedback_outcome(
    sequence_id: u64,
    is_correct: bool,
    ground_truth: Option<bool>,
    result: crate::error::Result<()>,
) -> StepOutcome {
    let error = result.err().map(|e| {
        warn!("Feedback rejected: {}", e);
        e.to_string()
    });

    StepOutcome::Feedback {
        sequence_id,
        is_correct,
        ground_truth,
        accepted: error.is_none(),
        error,
    }
}

/// Replay a session step by step on the calling thread.
pub fn replay(engine: &mut AggregationEngine, session: &Session) -> Vec<StepOutcome> {
    info!("Replaying {} session steps", session.steps.len());

    session
        .steps
        .iter()
        .map(|step| match step {
            SessionStep::Analyze { observation } => StepOutcome::Analyze {
                observation: observation.clone(),
                verdict: engine.analyze(observation),
            },
            SessionStep::Feedback {
                sequence_id,
                is_correct,
                ground_truth,
            } => feedback_outcome(
                *sequence_id,
                *is_correct,
                *ground_truth,
                engine.submit_feedback(*sequence_id, *is_correct, *ground_truth),
            ),
            SessionStep::Status => StepOutcome::Status {
                status: engine.status(),
            },
        })
        .collect()
}

/// Replay a session with parallel scoring. Steps still run in order.
pub async fn replay_concurrent(engine: &SharedEngine, session: &Session) -> Vec<StepOutcome> {
    info!(
        "Replaying {} session steps (concurrent scoring, {}ms deadline)",
        session.steps.len(),
        engine.score_timeout().as_millis()
    );

    let mut outcomes = Vec::with_capacity(session.steps.len());
    for step in &session.steps {
        let outcome = match step {
            SessionStep::Analyze { observation } => StepOutcome::Analyze {
                observation: observation.clone(),
                verdict: engine.analyze(observation).await,
            },
            SessionStep::Feedback {
                sequence_id,
                is_correct,
                ground_truth,
            } => feedback_outcome(
                *sequence_id,
                *is_correct,
                *ground_truth,
                engine
                    .submit_feedback(*sequence_id, *is_correct, *ground_truth)
                    .await,
            ),
            SessionStep::Status => StepOutcome::Status {
                status: engine.status().await,
            },
        };
        outcomes.push(outcome);
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::engine::RepeatFeedback;
    use crate::models::Specialization;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SESSION: &str = r#"{"steps": [
        {"step": "analyze", "observation": {"star_id": "Kepler-452", "period": 384.8, "depth": 0.00028, "noise": 0.00005}},
        {"step": "analyze", "observation": {"period": 3.5, "depth": 0.01}},
        {"step": "feedback", "sequence_id": 0, "is_correct": true, "ground_truth": true},
        {"step": "feedback", "sequence_id": 9, "is_correct": false},
        {"step": "status"}
    ]}"#;

    #[test]
    fn test_parse_session() {
        let session: Session = serde_json::from_str(SESSION).unwrap();
        assert_eq!(session.steps.len(), 5);
        assert_eq!(session.analysis_count(), 2);

        match &session.steps[0] {
            SessionStep::Analyze { observation } => {
                assert_eq!(observation.label(), "Kepler-452");
                assert_eq!(observation.get("period"), Some(384.8));
            }
            other => panic!("unexpected step: {:?}", other),
        }
        assert_eq!(
            session.steps[3],
            SessionStep::Feedback {
                sequence_id: 9,
                is_correct: false,
                ground_truth: None
            }
        );
    }

    #[test]
    fn test_load_session_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SESSION).unwrap();
        assert_eq!(Session::load(file.path()).unwrap().steps.len(), 5);

        let mut broken = NamedTempFile::new().unwrap();
        write!(broken, "{{\"steps\": [{{\"step\": \"dance\"}}]}}").unwrap();
        assert!(Session::load(broken.path()).is_err());
    }

    #[test]
    fn test_replay_records_rejected_feedback() {
        let session: Session = serde_json::from_str(SESSION).unwrap();
        let mut engine = build_engine(&Config::default()).unwrap();
        let outcomes = replay(&mut engine, &session);

        assert_eq!(outcomes.len(), 5);
        match &outcomes[3] {
            StepOutcome::Feedback {
                accepted, error, ..
            } => {
                assert!(!accepted);
                assert!(error.as_deref().unwrap().contains("Unknown sequence id 9"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        match &outcomes[4] {
            StepOutcome::Status { status } => {
                assert_eq!(status.total_analyses, 2);
                assert_eq!(status.total_feedback, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_build_engine_rejects_duplicate_ids() {
        let mut config = Config::default();
        config.analyzers = vec![
            AnalyzerConfig::new("twin", Specialization::Transit),
            AnalyzerConfig::new("twin", Specialization::Imaging),
        ];
        let err = build_engine(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("Analyzer already registered: twin"));
    }

    #[test]
    fn test_build_engine_applies_repeat_policy() {
        let mut config = Config::default();
        config.feedback.repeat = RepeatFeedback::Reject;
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.repeat_feedback(), RepeatFeedback::Reject);
        assert_eq!(engine.analyzers().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_replay_matches_sequential() {
        let session: Session = serde_json::from_str(SESSION).unwrap();

        let mut engine = build_engine(&Config::default()).unwrap();
        let sequential = replay(&mut engine, &session);

        let shared = SharedEngine::new(build_engine(&Config::default()).unwrap());
        let concurrent = replay_concurrent(&shared, &session).await;

        let predictions = |outcomes: &[StepOutcome]| -> Vec<f64> {
            outcomes
                .iter()
                .filter_map(|o| match o {
                    StepOutcome::Analyze { verdict, .. } => Some(verdict.prediction),
                    _ => None,
                })
                .collect()
        };
        assert_eq!(predictions(&sequential), predictions(&concurrent));
    }
}
