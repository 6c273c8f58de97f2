//! Local analyzers and the scoring capabilities they wrap.

pub mod explain;
pub mod features;
pub mod local;
pub mod scorer;

pub use local::{LocalAnalyzer, ScoringTask, ACCURACY_WINDOW, MAX_WEIGHT, MIN_WEIGHT};
pub use scorer::{BaselineScorer, FnScorer, ScoreOutput, Scorer};
