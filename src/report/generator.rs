//! Markdown and JSON report generation.
//!
//! This module renders a replayed session: every aggregated verdict, the
//! feedback outcomes, and the final engine status.

use crate::models::{AggregatedVerdict, Observation, SystemStatus};
use crate::session::{SessionMetadata, SessionReport, StepOutcome};
use anyhow::{Context, Result};
use std::path::Path;

/// Number of aggregated factors listed per analysis.
const TOP_FACTORS: usize = 5;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &SessionReport) -> String {
    let mut output = String::new();

    output.push_str("# Federated Verdict Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_analyses_section(report));
    output.push_str(&generate_feedback_section(&report.outcomes));
    output.push_str(&generate_status_section(&report.final_status));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &SessionMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Session:** `{}`\n", metadata.session));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Analyzers:** {}\n",
        metadata.analyzers.join(", ")
    ));
    section.push_str(&format!(
        "- **Scoring:** {}\n",
        if metadata.concurrent {
            "concurrent"
        } else {
            "sequential"
        }
    ));
    section.push_str(&format!(
        "- **Duration:** {:.3}s\n\n",
        metadata.duration_seconds
    ));

    section
}

/// Generate the analyses overview table plus one block per analysis.
fn generate_analyses_section(report: &SessionReport) -> String {
    let mut section = String::new();

    section.push_str("## Analyses\n\n");

    let verdicts: Vec<_> = report.verdicts().collect();
    if verdicts.is_empty() {
        section.push_str("No observations were analyzed.\n\n");
        return section;
    }

    section.push_str("| Seq | Target | Prediction | Confidence | Consensus |\n");
    section.push_str("|:---:|:---|:---:|:---:|:---:|\n");
    for (observation, verdict) in &verdicts {
        section.push_str(&format!(
            "| {} | {} | {:.4} | {:.4} | {:.4} |\n",
            verdict.sequence_id,
            observation.label(),
            verdict.prediction,
            verdict.confidence,
            verdict.consensus_strength
        ));
    }
    section.push('\n');

    for (observation, verdict) in verdicts {
        section.push_str(&generate_verdict_block(observation, verdict));
    }

    section
}

/// Generate the detail block of one analysis.
fn generate_verdict_block(observation: &Observation, verdict: &AggregatedVerdict) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### #{} {}\n\n",
        verdict.sequence_id,
        observation.label()
    ));

    if let Some(ref reasoning) = verdict.explanation.primary_reasoning {
        block.push_str(&format!("**Primary reasoning:** {}\n\n", reasoning));
    }

    if !verdict.analyzers.is_empty() {
        block.push_str("| Analyzer | Prediction | Weight |\n");
        block.push_str("|:---|:---:|:---:|\n");
        for snapshot in &verdict.analyzers {
            block.push_str(&format!(
                "| {} | {:.4} | {:.3} |\n",
                snapshot.analyzer_id, snapshot.prediction, snapshot.weight
            ));
        }
        block.push('\n');
    }

    let factors = verdict.top_factors(TOP_FACTORS);
    if !factors.is_empty() {
        block.push_str("**Top contributing factors:**\n\n");
        for (factor, importance) in factors {
            block.push_str(&format!("- {}: {:.4}\n", factor, importance));
        }
        block.push('\n');
    }

    for (factor, remarks) in &verdict.explanation.confidence_consensus {
        block.push_str(&format!("> **{}:** {}\n\n", factor, remarks));
    }

    for exclusion in &verdict.exclusions {
        block.push_str(&format!(
            "- ⚠️ Excluded `{}`: {}\n",
            exclusion.analyzer_id, exclusion.reason
        ));
    }
    if !verdict.exclusions.is_empty() {
        block.push('\n');
    }

    block
}

/// Generate the feedback table.
fn generate_feedback_section(outcomes: &[StepOutcome]) -> String {
    let rows: Vec<String> = outcomes
        .iter()
        .filter_map(|o| match o {
            StepOutcome::Feedback {
                sequence_id,
                is_correct,
                ground_truth,
                accepted,
                error,
            } => Some(format!(
                "| {} | {} | {} | {} |\n",
                sequence_id,
                if *is_correct { "correct" } else { "incorrect" },
                ground_truth.map_or("-".to_string(), |g| g.to_string()),
                if *accepted {
                    "✅ applied".to_string()
                } else {
                    format!("❌ {}", error.as_deref().unwrap_or("rejected"))
                }
            )),
            _ => None,
        })
        .collect();

    if rows.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Feedback\n\n");
    section.push_str("| Seq | Verdict | Ground truth | Result |\n");
    section.push_str("|:---:|:---:|:---:|:---|\n");
    for row in rows {
        section.push_str(&row);
    }
    section.push('\n');

    section
}

/// Generate the final status section.
fn generate_status_section(status: &SystemStatus) -> String {
    let mut section = String::new();

    section.push_str("## System Status\n\n");
    section.push_str(&format!("- **Total analyses:** {}\n", status.total_analyses));
    section.push_str(&format!("- **Total feedback:** {}\n", status.total_feedback));
    section.push_str(&format!(
        "- **System accuracy:** {:.4}\n\n",
        status.system_accuracy
    ));

    if !status.analyzers.is_empty() {
        section.push_str("| Analyzer | Specialization | Weight | Samples | Recent accuracy |\n");
        section.push_str("|:---|:---|:---:|:---:|:---:|\n");
        for stats in &status.analyzers {
            section.push_str(&format!(
                "| {} | {} | {:.3} | {} | {} |\n",
                stats.analyzer_id,
                stats.specialization,
                stats.reliability_weight,
                stats.sample_count,
                stats
                    .recent_accuracy
                    .map_or("-".to_string(), |a| format!("{:.2}", a))
            ));
        }
        section.push('\n');
    }

    if !status.consensus_trend.is_empty() {
        let trend: Vec<String> = status
            .consensus_trend
            .iter()
            .map(|c| format!("{:.2}", c))
            .collect();
        section.push_str(&format!("**Consensus trend:** {}\n\n", trend.join(" → ")));
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by fedverdict*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &SessionReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

/// Write rendered report content to a file.
pub fn save_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
