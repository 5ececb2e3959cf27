//! @ai:module:intent Metric types for run comparison results
//! @ai:module:layer domain
//! @ai:module:public_api MetricValue, RunSummary, RunCell, ExampleRow, PairwiseAgreement, ComparisonResults
//! @ai:module:stateless true

use crate::runner::Prediction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// @ai:intent Output of an analysis function for one example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Scalar(v) if v.fract() == 0.0 => write!(f, "{}", *v as i64),
            MetricValue::Scalar(v) => write!(f, "{:.2}", v),
            MetricValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// @ai:intent Aggregated statistics for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: String,
    pub model: Option<String>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Aggregate per analysis function, failed slots excluded
    pub metrics: BTreeMap<String, f64>,
}

/// @ai:intent One run's prediction and features for one example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCell {
    pub run: String,
    pub prediction: Prediction,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricValue>,
}

/// @ai:intent Side-by-side view of every run on one example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRow {
    pub index: usize,
    pub text: String,
    pub label: String,
    pub cells: Vec<RunCell>,
    /// Completed predictions normalize to more than one class
    pub disagreement: bool,
}

/// @ai:intent Fraction of examples on which two runs give the same class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseAgreement {
    pub left: String,
    pub right: String,
    /// Examples where both runs completed
    pub compared: usize,
    pub agreement_rate: f64,
}

/// @ai:intent Complete comparison across runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResults {
    pub timestamp: String,
    pub domain: String,
    pub text_field: String,
    pub runs: Vec<RunSummary>,
    pub pairwise: Vec<PairwiseAgreement>,
    pub examples: Vec<ExampleRow>,
    pub disagreements: usize,
}

impl ComparisonResults {
    /// @ai:intent Rows where runs disagree, for the diff view
    /// @ai:effects pure
    pub fn disagreeing_examples(&self) -> impl Iterator<Item = &ExampleRow> {
        self.examples.iter().filter(|row| row.disagreement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_value_display() {
        assert_eq!(MetricValue::Scalar(12.0).to_string(), "12");
        assert_eq!(MetricValue::Scalar(0.456).to_string(), "0.46");
        assert_eq!(MetricValue::Text("true".to_string()).to_string(), "true");
    }

    #[test]
    fn test_metric_value_untagged_json() {
        let values: Vec<MetricValue> = serde_json::from_str(r#"[1.5, "true"]"#).unwrap();
        assert_eq!(
            values,
            vec![MetricValue::Scalar(1.5), MetricValue::Text("true".to_string())]
        );
    }
}
