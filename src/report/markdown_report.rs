//! @ai:module:intent Markdown report generation
//! @ai:module:layer infrastructure
//! @ai:module:public_api MarkdownReporter
//! @ai:module:stateless true

use crate::metrics::{ComparisonResults, ExampleRow};
use crate::runner::Prediction;
use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt::Write as FmtWrite;
use std::path::Path;

const MAX_CELL_CHARS: usize = 60;

/// @ai:intent Trait for Markdown report generation
pub trait MarkdownReporterTrait: Send + Sync {
    /// @ai:intent Generate Markdown report from results
    fn generate(&self, results: &ComparisonResults, output_path: &Path) -> Result<()>;
}

/// @ai:intent Generates Markdown reports from comparison results
pub struct MarkdownReporter;

impl MarkdownReporter {
    /// @ai:intent Create a new Markdown reporter
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent Make text safe and short enough for a table cell
    /// @ai:effects pure
    fn format_cell(text: &str) -> String {
        let flat = text.replace('|', "\\|").replace(['\n', '\r'], " ");
        let trimmed = flat.trim();

        if trimmed.chars().count() > MAX_CELL_CHARS {
            let prefix: String = trimmed.chars().take(MAX_CELL_CHARS).collect();
            format!("{}…", prefix)
        } else {
            trimmed.to_string()
        }
    }

    fn format_prediction(prediction: &Prediction) -> String {
        match prediction {
            Prediction::Completed { text } => Self::format_cell(text),
            Prediction::Failed { .. } => "**FAILED**".to_string(),
        }
    }

    /// @ai:intent Generate header section
    /// @ai:effects pure
    fn generate_summary(results: &ComparisonResults) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "# Run Comparison")?;
        writeln!(output)?;
        writeln!(output, "**Date:** {}", results.timestamp)?;
        writeln!(output, "**Domain:** {}", results.domain)?;
        writeln!(output, "**Examples:** {}", results.examples.len())?;
        writeln!(output, "**Disagreements:** {}", results.disagreements)?;
        writeln!(output)?;

        Ok(output)
    }

    /// @ai:intent Generate per-run metrics table
    /// @ai:effects pure
    fn generate_runs_table(results: &ComparisonResults) -> Result<String> {
        let mut output = String::new();

        let metric_names: BTreeSet<&str> = results
            .runs
            .iter()
            .flat_map(|run| run.metrics.keys().map(String::as_str))
            .collect();

        writeln!(output, "## Runs")?;
        writeln!(output)?;

        write!(output, "| Run | Model | Completed | Failed |")?;
        for name in &metric_names {
            write!(output, " {} |", name)?;
        }
        writeln!(output)?;

        write!(output, "|-----|-------|-----------|--------|")?;
        for _ in &metric_names {
            write!(output, "------|")?;
        }
        writeln!(output)?;

        for run in &results.runs {
            write!(
                output,
                "| {} | {} | {}/{} | {} |",
                run.run,
                run.model.as_deref().unwrap_or("-"),
                run.completed,
                run.total,
                run.failed
            )?;

            for name in &metric_names {
                match run.metrics.get(*name) {
                    Some(value) => write!(output, " {:.1} |", value)?,
                    None => write!(output, " - |")?,
                }
            }
            writeln!(output)?;
        }

        writeln!(output)?;
        Ok(output)
    }

    /// @ai:intent Generate pairwise agreement table
    /// @ai:effects pure
    fn generate_agreement_section(results: &ComparisonResults) -> Result<String> {
        let mut output = String::new();

        if results.pairwise.is_empty() {
            return Ok(output);
        }

        writeln!(output, "## Agreement")?;
        writeln!(output)?;
        writeln!(output, "| Left | Right | Compared | Agreement |")?;
        writeln!(output, "|------|-------|----------|-----------|")?;

        for pair in &results.pairwise {
            writeln!(
                output,
                "| {} | {} | {} | {:.1}% |",
                pair.left, pair.right, pair.compared, pair.agreement_rate
            )?;
        }

        writeln!(output)?;
        Ok(output)
    }

    /// @ai:intent Generate diff table of examples where runs disagree or fail
    /// @ai:effects pure
    fn generate_diff_section(results: &ComparisonResults) -> Result<String> {
        let mut output = String::new();

        let rows: Vec<&ExampleRow> = results
            .examples
            .iter()
            .filter(|row| row.disagreement || row.cells.iter().any(|c| c.prediction.is_failed()))
            .collect();

        writeln!(output, "## Differences")?;
        writeln!(output)?;

        if rows.is_empty() {
            writeln!(output, "All runs agree on every example.")?;
            writeln!(output)?;
            return Ok(output);
        }

        write!(output, "| # | {} | Label |", results.text_field)?;
        for run in &results.runs {
            write!(output, " {} |", run.run)?;
        }
        writeln!(output)?;

        write!(output, "|---|------|-------|")?;
        for _ in &results.runs {
            write!(output, "------|")?;
        }
        writeln!(output)?;

        for row in rows {
            write!(
                output,
                "| {} | {} | {} |",
                row.index,
                Self::format_cell(&row.text),
                Self::format_cell(&row.label)
            )?;
            for cell in &row.cells {
                write!(output, " {} |", Self::format_prediction(&cell.prediction))?;
            }
            writeln!(output)?;
        }

        writeln!(output)?;
        Ok(output)
    }
}

impl Default for MarkdownReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownReporterTrait for MarkdownReporter {
    /// @ai:intent Generate Markdown report to file
    /// @ai:effects fs:write
    fn generate(&self, results: &ComparisonResults, output_path: &Path) -> Result<()> {
        let mut content = String::new();

        content.push_str(&Self::generate_summary(results)?);
        content.push_str(&Self::generate_runs_table(results)?);
        content.push_str(&Self::generate_agreement_section(results)?);
        content.push_str(&Self::generate_diff_section(results)?);

        std::fs::write(output_path, content)?;
        Ok(())
    }
}
