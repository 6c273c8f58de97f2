//! Concurrent front-end over [`AggregationEngine`].
//!
//! Scoring runs in parallel outside the lock, each analyzer bounded by a
//! timeout. Aggregation and feedback take the lock, so weights, history and
//! ledger only ever see one writer.

use crate::analyzer::ScoringTask;
use crate::engine::coordinator::AggregationEngine;
use crate::error::{Result, ScorerError};
use crate::models::{AggregatedVerdict, AnalyzerVerdict, Exclusion, Observation, SystemStatus};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default per-analyzer scoring deadline.
pub const DEFAULT_SCORE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Cloneable handle to an engine shared between tasks.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<AggregationEngine>>,
    score_timeout: Duration,
}

impl SharedEngine {
    pub fn new(engine: AggregationEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
            score_timeout: DEFAULT_SCORE_TIMEOUT,
        }
    }

    /// Set the per-analyzer scoring deadline.
    ///
    /// A scorer that misses the deadline is abandoned, not cancelled: its
    /// blocking thread runs until the scorer returns, and dropping the
    /// runtime waits for it.
    pub fn with_score_timeout(mut self, timeout: Duration) -> Self {
        self.score_timeout = timeout;
        self
    }

    pub fn score_timeout(&self) -> Duration {
        self.score_timeout
    }

    /// Score with every analyzer in parallel, then aggregate under the lock.
    ///
    /// Analyzers that fail, panic or miss the deadline are excluded from
    /// this aggregation.
    pub async fn analyze(&self, observation: &Observation) -> AggregatedVerdict {
        let tasks = self.inner.lock().await.scoring_tasks();
        let observation = Arc::new(observation.clone());

        let outcomes = join_all(
            tasks
                .into_iter()
                .map(|task| run_with_timeout(task, Arc::clone(&observation), self.score_timeout)),
        )
        .await;

        let mut verdicts = Vec::with_capacity(outcomes.len());
        let mut exclusions = Vec::new();
        for (analyzer_id, outcome) in outcomes {
            match outcome {
                Ok(verdict) => verdicts.push(verdict),
                Err(e) => {
                    warn!("Excluding analyzer {}: {}", analyzer_id, e);
                    exclusions.push(Exclusion {
                        analyzer_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let observation = Arc::try_unwrap(observation).unwrap_or_else(|shared| (*shared).clone());
        self.inner
            .lock()
            .await
            .commit(observation, verdicts, exclusions)
    }

    pub async fn submit_feedback(
        &self,
        sequence_id: u64,
        is_correct: bool,
        ground_truth: Option<bool>,
    ) -> Result<()> {
        self.inner
            .lock()
            .await
            .submit_feedback(sequence_id, is_correct, ground_truth)
    }

    pub async fn status(&self) -> SystemStatus {
        self.inner.lock().await.status()
    }

    /// Run `f` with exclusive access to the engine.
    pub async fn with_engine<R>(&self, f: impl FnOnce(&mut AggregationEngine) -> R) -> R {
        let mut engine = self.inner.lock().await;
        f(&mut engine)
    }
}

async fn run_with_timeout(
    task: ScoringTask,
    observation: Arc<Observation>,
    deadline: Duration,
) -> (String, std::result::Result<AnalyzerVerdict, ScorerError>) {
    let analyzer_id = task.analyzer_id.clone();
    let handle = tokio::task::spawn_blocking(move || task.run(&observation));

    let outcome = match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ScorerError::Aborted(join_error.to_string())),
        Err(_) => Err(ScorerError::Timeout(deadline.as_millis() as u64)),
    };

    debug!(analyzer = %analyzer_id, ok = outcome.is_ok(), "scoring finished");
    (analyzer_id, outcome)
}
