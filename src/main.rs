//! fedverdict - replay a session against a federated analyzer engine
//!
//! Reads a JSON session of analyze / feedback / status steps, replays it
//! against the configured analyzers, and writes a Markdown or JSON report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (unreadable session, bad config, write failure, etc.)

use anyhow::{Context, Result};
use chrono::Utc;
use federated_verdict::cli::{Args, OutputFormat};
use federated_verdict::config::{Config, CONFIG_FILE_NAME};
use federated_verdict::engine::SharedEngine;
use federated_verdict::report;
use federated_verdict::session::{self, Session, SessionMetadata, SessionReport};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config first: `[general] verbose` feeds the log level.
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("fedverdict v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    if let Err(e) = run_session(args, config).await {
        error!("Session failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .fedverdict.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize analyzers, scoring, and feedback policy.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Replay the session and write the report.
async fn run_session(args: Args, config: Config) -> Result<()> {
    let start_time = Instant::now();

    let session_path = args.session.clone().context("No session file given")?;
    let session = Session::load(&session_path)?;
    info!(
        "Loaded session {} ({} steps, {} analyses)",
        session_path.display(),
        session.steps.len(),
        session.analysis_count()
    );

    let engine = session::build_engine(&config)?;
    let analyzer_ids: Vec<String> = engine
        .analyzers()
        .iter()
        .map(|a| a.id().to_string())
        .collect();

    println!("🛰️  Replaying session: {}", session_path.display());
    println!("   Analyzers: {}", analyzer_ids.join(", "));
    println!(
        "   Scoring: {}",
        if config.scoring.concurrent {
            format!("concurrent ({}ms deadline)", config.scoring.timeout_ms)
        } else {
            "sequential".to_string()
        }
    );

    let (outcomes, final_status) = if config.scoring.concurrent {
        let shared = SharedEngine::new(engine)
            .with_score_timeout(Duration::from_millis(config.scoring.timeout_ms));
        let outcomes = session::replay_concurrent(&shared, &session).await;
        let status = shared.status().await;
        (outcomes, status)
    } else {
        let mut engine = engine;
        let outcomes = session::replay(&mut engine, &session);
        (outcomes, engine.status())
    };

    let report = SessionReport {
        metadata: SessionMetadata {
            session: session_path.display().to_string(),
            generated_at: Utc::now(),
            analyzers: analyzer_ids,
            concurrent: config.scoring.concurrent,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        outcomes,
        final_status,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };
    let output_path = PathBuf::from(&config.general.output);
    report::save_report(&output, &output_path)?;

    let status = &report.final_status;
    println!("\n📊 Session Summary:");
    println!("   Analyses: {}", status.total_analyses);
    println!(
        "   Feedback: {} applied, {} rejected",
        status.total_feedback,
        report.rejected_feedback()
    );
    println!("   System accuracy: {:.2}", status.system_accuracy);
    for stats in &status.analyzers {
        println!(
            "   - {} ({}): weight {:.3}",
            stats.analyzer_id, stats.specialization, stats.reliability_weight
        );
    }
    println!("   Duration: {:.3}s", report.metadata.duration_seconds);
    println!("\n✅ Report saved to: {}", output_path.display());

    Ok(())
}

/// Where the configuration came from.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    BuiltIn,
    Fallback(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE_NAME),
            ConfigSource::BuiltIn => debug!("No config file found, using defaults"),
            ConfigSource::Fallback(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    Ok(match Config::load_default() {
        Ok(Some(config)) => (config, ConfigSource::DefaultFile),
        Ok(None) => (Config::default(), ConfigSource::BuiltIn),
        Err(e) => (Config::default(), ConfigSource::Fallback(e)),
    })
}
