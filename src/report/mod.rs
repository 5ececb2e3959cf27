//! @ai:module:intent Comparative report generation across experiment runs
//! @ai:module:layer infrastructure
//! @ai:module:public_api ComparativeVisualizerTrait, ReportGenerator, VisualizerConfig, JsonReporter, MarkdownReporter

pub mod json_report;
pub mod markdown_report;

pub use json_report::{JsonReporter, JsonReporterTrait};
pub use markdown_report::{MarkdownReporter, MarkdownReporterTrait};

use crate::dataset::LabeledExample;
use crate::experiment::ExperimentRun;
use crate::metrics::{AnalysisFn, ComparisonAggregator, ComparisonAggregatorTrait, ComparisonResults};
use anyhow::Result;
use std::path::PathBuf;

/// @ai:intent Where and how a comparison report is written
#[derive(Debug, Clone)]
pub struct VisualizerConfig {
    /// Output (cache) directory for generated reports
    pub output_dir: PathBuf,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results/comparison"),
        }
    }
}

/// @ai:intent Renders a comparison of runs over the original data
pub trait ComparativeVisualizerTrait: Send + Sync {
    /// @ai:intent Compare runs and write the report
    fn render(
        &self,
        examples: &[LabeledExample],
        runs: &[ExperimentRun],
        domain: &str,
        text_field: &str,
        analyses: &[Box<dyn AnalysisFn>],
        config: &VisualizerConfig,
    ) -> Result<ComparisonResults>;
}

/// @ai:intent Combined JSON and Markdown report generator
pub struct ReportGenerator {
    json: JsonReporter,
    markdown: MarkdownReporter,
}

impl ReportGenerator {
    /// @ai:intent Create a new report generator
    /// @ai:effects pure
    pub fn new() -> Self {
        Self {
            json: JsonReporter::new(),
            markdown: MarkdownReporter::new(),
        }
    }

    /// @ai:intent Write all report formats for already aggregated results
    /// @ai:effects fs:write
    pub fn generate_all(&self, results: &ComparisonResults, config: &VisualizerConfig) -> Result<()> {
        std::fs::create_dir_all(&config.output_dir)?;

        self.json
            .generate(results, &config.output_dir.join("comparison.json"))?;
        self.json
            .generate_disagreements(results, &config.output_dir.join("disagreements.json"))?;
        self.markdown
            .generate(results, &config.output_dir.join("comparison.md"))?;

        tracing::info!("Reports generated in {}", config.output_dir.display());
        Ok(())
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparativeVisualizerTrait for ReportGenerator {
    /// @ai:intent Aggregate the runs and write JSON and Markdown reports
    /// @ai:effects fs:write
    fn render(
        &self,
        examples: &[LabeledExample],
        runs: &[ExperimentRun],
        domain: &str,
        text_field: &str,
        analyses: &[Box<dyn AnalysisFn>],
        config: &VisualizerConfig,
    ) -> Result<ComparisonResults> {
        let results =
            ComparisonAggregator::new(domain).aggregate(examples, runs, text_field, analyses)?;
        self.generate_all(&results, config)?;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::default_analyses;
    use crate::runner::Prediction;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_render_writes_both_reports() {
        let temp = TempDir::new().unwrap();
        let config = VisualizerConfig {
            output_dir: temp.path().join("cache"),
        };
        let examples = vec![LabeledExample::text("great film", "positive")];
        let runs = vec![ExperimentRun::new(
            "hosted",
            BTreeMap::new(),
            vec![Prediction::completed("positive")],
        )];

        let results = ReportGenerator::new()
            .render(
                &examples,
                &runs,
                "text-classification",
                "text",
                &default_analyses(),
                &config,
            )
            .unwrap();

        assert_eq!(results.domain, "text-classification");
        assert!(config.output_dir.join("comparison.json").exists());
        assert!(config.output_dir.join("comparison.md").exists());
        assert!(config.output_dir.join("disagreements.json").exists());
    }
}
