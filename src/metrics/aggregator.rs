//! @ai:module:intent Builds cross-run comparison results
//! @ai:module:layer application
//! @ai:module:public_api ComparisonAggregator, ComparisonAggregatorTrait
//! @ai:module:stateless true

use crate::dataset::LabeledExample;
use crate::experiment::ExperimentRun;
use crate::metrics::analysis::{normalize_label, AnalysisFn};
use crate::metrics::types::{
    ComparisonResults, ExampleRow, MetricValue, PairwiseAgreement, RunCell, RunSummary,
};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

/// @ai:intent Trait for comparing runs over the same dataset
pub trait ComparisonAggregatorTrait: Send + Sync {
    /// @ai:intent Aggregate runs into comparison results
    /// @ai:pre every run has exactly one prediction per example
    fn aggregate(
        &self,
        examples: &[LabeledExample],
        runs: &[ExperimentRun],
        text_field: &str,
        analyses: &[Box<dyn AnalysisFn>],
    ) -> Result<ComparisonResults>;
}

/// @ai:intent Aggregates run predictions into summaries, diffs and agreement
pub struct ComparisonAggregator {
    domain: String,
}

impl ComparisonAggregator {
    /// @ai:intent Create an aggregator for a domain tag such as "text-classification"
    /// @ai:effects pure
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
        }
    }

    /// @ai:intent Features of one prediction under every analysis
    /// @ai:effects pure
    fn compute_cell(
        example: &LabeledExample,
        run: &ExperimentRun,
        index: usize,
        analyses: &[Box<dyn AnalysisFn>],
    ) -> RunCell {
        let prediction = run.predictions()[index].clone();

        let metrics = match prediction.text() {
            Some(text) => analyses
                .iter()
                .map(|a| {
                    (
                        a.name().to_string(),
                        a.compute(&example.record, &example.label, text),
                    )
                })
                .collect(),
            None => BTreeMap::new(),
        };

        RunCell {
            run: run.name().to_string(),
            prediction,
            metrics,
        }
    }

    /// @ai:intent Summarize one run's cells
    /// @ai:effects pure
    fn summarize(
        run: &ExperimentRun,
        cells: &[&RunCell],
        analyses: &[Box<dyn AnalysisFn>],
    ) -> RunSummary {
        let failed = run.failed_count();

        let metrics = analyses
            .iter()
            .filter_map(|a| {
                let values: Vec<MetricValue> = cells
                    .iter()
                    .filter_map(|cell| cell.metrics.get(a.name()).cloned())
                    .collect();
                a.aggregate(&values).map(|v| (a.name().to_string(), v))
            })
            .collect();

        RunSummary {
            run: run.name().to_string(),
            model: run.model().map(str::to_string),
            total: run.predictions().len(),
            completed: run.predictions().len() - failed,
            failed,
            metrics,
        }
    }
}

impl Default for ComparisonAggregator {
    fn default() -> Self {
        Self::new("text-classification")
    }
}

/// Normalized classes of the completed cells in a row.
fn row_classes(cells: &[RunCell]) -> BTreeSet<String> {
    cells
        .iter()
        .filter_map(|cell| cell.prediction.text())
        .map(normalize_label)
        .collect()
}

/// @ai:intent Agreement for every pair of runs, in run order
/// @ai:effects pure
fn pairwise_agreement(runs: &[ExperimentRun]) -> Vec<PairwiseAgreement> {
    let mut pairs = Vec::new();

    for (i, left) in runs.iter().enumerate() {
        for right in &runs[i + 1..] {
            let (compared, agreed) = left
                .predictions()
                .iter()
                .zip(right.predictions())
                .filter_map(|(l, r)| Some((l.text()?, r.text()?)))
                .fold((0usize, 0usize), |(n, a), (l, r)| {
                    let same = normalize_label(l) == normalize_label(r);
                    (n + 1, a + usize::from(same))
                });

            let agreement_rate = if compared == 0 {
                0.0
            } else {
                agreed as f64 / compared as f64 * 100.0
            };

            pairs.push(PairwiseAgreement {
                left: left.name().to_string(),
                right: right.name().to_string(),
                compared,
                agreement_rate,
            });
        }
    }

    pairs
}

impl ComparisonAggregatorTrait for ComparisonAggregator {
    /// @ai:intent Aggregate runs into comparison results
    /// @ai:effects pure
    fn aggregate(
        &self,
        examples: &[LabeledExample],
        runs: &[ExperimentRun],
        text_field: &str,
        analyses: &[Box<dyn AnalysisFn>],
    ) -> Result<ComparisonResults> {
        for run in runs {
            if run.predictions().len() != examples.len() {
                anyhow::bail!(
                    "Run '{}' has {} predictions but the dataset has {} examples",
                    run.name(),
                    run.predictions().len(),
                    examples.len()
                );
            }
        }

        let rows: Vec<ExampleRow> = examples
            .iter()
            .enumerate()
            .map(|(index, example)| {
                let cells: Vec<RunCell> = runs
                    .iter()
                    .map(|run| Self::compute_cell(example, run, index, analyses))
                    .collect();

                ExampleRow {
                    index,
                    text: example.record.get(text_field).unwrap_or_default().to_string(),
                    label: example.label.clone(),
                    disagreement: row_classes(&cells).len() > 1,
                    cells,
                }
            })
            .collect();

        let summaries = runs
            .iter()
            .enumerate()
            .map(|(run_index, run)| {
                let cells: Vec<&RunCell> = rows.iter().map(|row| &row.cells[run_index]).collect();
                Self::summarize(run, &cells, analyses)
            })
            .collect();

        let disagreements = rows.iter().filter(|row| row.disagreement).count();

        Ok(ComparisonResults {
            timestamp: chrono::Utc::now().to_rfc3339(),
            domain: self.domain.clone(),
            text_field: text_field.to_string(),
            runs: summaries,
            pairwise: pairwise_agreement(runs),
            examples: rows,
            disagreements,
        })
    }
}
