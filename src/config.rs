//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.fedverdict.toml` files.

use crate::engine::RepeatFeedback;
use crate::models::Specialization;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".fedverdict.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Scoring settings.
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Feedback settings.
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Analyzers to register, in order.
    #[serde(default = "default_analyzers")]
    pub analyzers: Vec<AnalyzerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            scoring: ScoringConfig::default(),
            feedback: FeedbackConfig::default(),
            analyzers: default_analyzers(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "fedverdict_report.md".to_string()
}

/// How analyzers are run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Score analyzers in parallel with a per-analyzer deadline.
    #[serde(default)]
    pub concurrent: bool,

    /// Per-analyzer deadline in milliseconds (concurrent mode only).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            concurrent: false,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

/// Feedback handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Policy for feedback on an already-reviewed analysis.
    #[serde(default)]
    pub repeat: RepeatFeedback,
}

/// One analyzer entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub id: String,
    #[serde(default)]
    pub specialization: Specialization,
}

impl AnalyzerConfig {
    pub fn new(id: &str, specialization: Specialization) -> Self {
        Self {
            id: id.to_string(),
            specialization,
        }
    }
}

fn default_analyzers() -> Vec<AnalyzerConfig> {
    vec![
        AnalyzerConfig::new("transit_specialist", Specialization::Transit),
        AnalyzerConfig::new("radial_velocity_expert", Specialization::RadialVelocity),
        AnalyzerConfig::new("imaging_analyzer", Specialization::Imaging),
        AnalyzerConfig::new("general_detector", Specialization::General),
    ]
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when the CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if args.concurrent {
            self.scoring.concurrent = true;
        }
        if let Some(timeout_ms) = args.timeout_ms {
            self.scoring.timeout_ms = timeout_ms;
        }
        if args.reject_repeat_feedback {
            self.feedback.repeat = RepeatFeedback::Reject;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
