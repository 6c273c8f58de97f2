//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// fedverdict - reliability-weighted consensus over independent analyzers
///
/// Replays a session of candidate observations and human feedback against
/// a set of analyzers, then writes a Markdown or JSON report.
///
/// Examples:
///   fedverdict --session session.json
///   fedverdict --session session.json --format json --output status.json
///   fedverdict --session session.json --concurrent --timeout-ms 250
///   fedverdict --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Session file (JSON) with analyze / feedback / status steps
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub session: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to the configured output (fedverdict_report.md)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .fedverdict.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "FEDVERDICT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Score analyzers in parallel with a per-analyzer deadline
    #[arg(long)]
    pub concurrent: bool,

    /// Per-analyzer scoring deadline in milliseconds (with --concurrent)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Reject repeated feedback on the same analysis instead of compounding it
    #[arg(long)]
    pub reject_repeat_feedback: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .fedverdict.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref session) = self.session {
            if !session.exists() {
                return Err(format!("Session file does not exist: {}", session.display()));
            }
            if !session.is_file() {
                return Err(format!("Session path is not a file: {}", session.display()));
            }
        }

        if let Some(timeout) = self.timeout_ms {
            if timeout == 0 {
                return Err("Timeout must be at least 1 millisecond".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `[general] verbose` from the configuration file;
    /// `--quiet` overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            session: None,
            output: None,
            config: None,
            format: OutputFormat::Markdown,
            concurrent: false,
            timeout_ms: None,
            reject_repeat_feedback: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "fedverdict",
            "--session",
            "s.json",
            "--format",
            "json",
            "--concurrent",
            "--timeout-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(args.session, Some(PathBuf::from("s.json")));
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.concurrent);
        assert_eq!(args.timeout_ms, Some(250));
    }

    #[test]
    fn test_session_required_without_init_config() {
        assert!(Args::try_parse_from(["fedverdict"]).is_err());
        assert!(Args::try_parse_from(["fedverdict", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_missing_session() {
        let mut args = make_args();
        args.session = Some(PathBuf::from("/nonexistent/session.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut args = make_args();
        args.timeout_ms = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_log_level_follows_config_verbose() {
        let mut args = make_args();
        let mut config = crate::config::Config::default();
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::INFO);

        config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::ERROR);
    }
}
