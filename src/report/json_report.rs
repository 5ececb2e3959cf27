//! @ai:module:intent JSON export of run comparisons
//! @ai:module:layer infrastructure
//! @ai:module:public_api JsonReporter
//! @ai:module:stateless true

use crate::metrics::{ComparisonResults, ExampleRow};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// @ai:intent Trait for JSON report generation
pub trait JsonReporterTrait: Send + Sync {
    /// @ai:intent Generate JSON report from results
    fn generate(&self, results: &ComparisonResults, output_path: &Path) -> Result<()>;

    /// @ai:intent Write only the examples on which runs disagree
    fn generate_disagreements(&self, results: &ComparisonResults, output_path: &Path)
        -> Result<()>;
}

/// Subset of a comparison kept for quick review of divergent examples
#[derive(Serialize)]
struct DisagreementExport<'a> {
    domain: &'a str,
    runs: Vec<&'a str>,
    examples: Vec<&'a ExampleRow>,
}

/// @ai:intent Generates JSON reports from comparison results
pub struct JsonReporter;

impl JsonReporter {
    /// @ai:intent Create a new JSON reporter
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }

    /// @ai:effects fs:write
    fn write_json<T: Serialize>(value: &T, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        Ok(())
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonReporterTrait for JsonReporter {
    /// @ai:intent Generate JSON report to file
    /// @ai:effects fs:write
    fn generate(&self, results: &ComparisonResults, output_path: &Path) -> Result<()> {
        Self::write_json(results, output_path)
    }

    /// @ai:effects fs:write
    fn generate_disagreements(
        &self,
        results: &ComparisonResults,
        output_path: &Path,
    ) -> Result<()> {
        let export = DisagreementExport {
            domain: &results.domain,
            runs: results.runs.iter().map(|run| run.run.as_str()).collect(),
            examples: results.disagreeing_examples().collect(),
        };
        Self::write_json(&export, output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{RunCell, RunSummary};
    use crate::runner::Prediction;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn row(index: usize, disagreement: bool) -> ExampleRow {
        ExampleRow {
            index,
            text: format!("review {}", index),
            label: "positive".to_string(),
            cells: vec![RunCell {
                run: "hosted".to_string(),
                prediction: Prediction::completed("positive"),
                metrics: BTreeMap::new(),
            }],
            disagreement,
        }
    }

    #[test]
    fn test_generate_json_report() {
        let reporter = JsonReporter::new();
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("comparison.json");

        let results = ComparisonResults {
            timestamp: "2026-01-19T00:00:00Z".to_string(),
            domain: "text-classification".to_string(),
            text_field: "text".to_string(),
            runs: vec![RunSummary {
                run: "hosted".to_string(),
                total: 3,
                completed: 3,
                ..Default::default()
            }],
            pairwise: vec![],
            examples: vec![],
            disagreements: 0,
        };

        reporter.generate(&results, &output).unwrap();
        assert!(output.exists());

        let content = std::fs::read_to_string(&output).unwrap();
        let parsed: ComparisonResults = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, results);
    }

    #[test]
    fn test_disagreement_export_keeps_only_divergent_rows() {
        let reporter = JsonReporter::new();
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("disagreements.json");

        let results = ComparisonResults {
            timestamp: "2026-01-19T00:00:00Z".to_string(),
            domain: "text-classification".to_string(),
            text_field: "text".to_string(),
            runs: vec![RunSummary {
                run: "hosted".to_string(),
                ..Default::default()
            }],
            pairwise: vec![],
            examples: vec![row(0, false), row(1, true), row(2, false)],
            disagreements: 1,
        };

        reporter.generate_disagreements(&results, &output).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let examples = parsed["examples"].as_array().unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0]["index"], 1);
        assert_eq!(parsed["runs"][0], "hosted");
    }
}
