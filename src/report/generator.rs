//! Markdown and JSON population reports.
//!
//! This module renders per-robot prediction summaries, either from a
//! stored population's histories or from one round's aggregate map.

use crate::analysis::{asymmetric_agents, totals};
use crate::models::{AgentSummary, PredictionCounts};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Metadata about the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Where the summaries came from (population directory or round label).
    pub source: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of agents summarized.
    pub agents: usize,
}

/// A complete population report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationReport {
    pub metadata: ReportMetadata,
    pub totals: PredictionCounts,
    pub agents: Vec<AgentSummary>,
}

impl PopulationReport {
    /// Build a report over already computed summaries.
    pub fn new(source: impl Into<String>, agents: Vec<AgentSummary>) -> Self {
        Self {
            metadata: ReportMetadata {
                source: source.into(),
                generated_at: Utc::now(),
                agents: agents.len(),
            },
            totals: totals(&agents),
            agents,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &PopulationReport) -> String {
    let mut output = String::new();

    output.push_str("# Genotick Population Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_totals_section(&report.totals, &report.agents));
    output.push_str(&generate_agents_section(&report.agents));

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Robots:** {}\n\n", metadata.agents));

    section
}

fn generate_totals_section(totals: &PredictionCounts, agents: &[AgentSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Totals\n\n");
    section.push_str("| ↑ Up | ↓ Down | · Out | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        totals.up,
        totals.down,
        totals.out,
        totals.total()
    ));

    let skewed = asymmetric_agents(agents).len();
    if skewed > 0 {
        section.push_str(&format!(
            "{} of {} robots have unbalanced UP/DOWN votes.\n\n",
            skewed,
            agents.len()
        ));
    }

    section
}

fn generate_agents_section(agents: &[AgentSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Robots\n\n");

    if agents.is_empty() {
        section.push_str("The population is empty.\n\n");
        return section;
    }

    section.push_str("| Robot | Up | Down | Out | Predictions | Symmetrical |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
    for summary in agents {
        section.push_str(&format!(
            "| `{}` | {} | {} | {} | {} | {} |\n",
            summary.agent,
            summary.counts.up,
            summary.counts.down,
            summary.counts.out,
            summary.counts.total(),
            if summary.is_symmetrical() { "yes" } else { "no" }
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &PopulationReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
