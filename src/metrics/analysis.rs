//! @ai:module:intent Pluggable per-example analysis functions
//! @ai:module:layer domain
//! @ai:module:public_api AnalysisFn, PredictionLength, ExactMatch, ExactMatchRate, normalize_label, default_analyses
//! @ai:module:stateless true

use crate::dataset::InputRecord;
use crate::metrics::types::MetricValue;

/// @ai:intent Computes a scalar or text feature from (input, label, prediction)
pub trait AnalysisFn: Send + Sync {
    /// @ai:intent Column name used in reports
    fn name(&self) -> &str;

    /// @ai:intent Feature for one completed prediction
    fn compute(&self, record: &InputRecord, label: &str, prediction: &str) -> MetricValue;

    /// @ai:intent Per-run summary of the computed values; None if not aggregable
    /// @ai:effects pure
    fn aggregate(&self, values: &[MetricValue]) -> Option<f64> {
        mean(values.iter().filter_map(MetricValue::as_scalar))
    }
}

/// @ai:intent Reduce a free-form completion to a comparable class label
/// @ai:effects pure
pub fn normalize_label(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split_whitespace().next())
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .unwrap_or_default()
}

fn mean<I: Iterator<Item = f64>>(iter: I) -> Option<f64> {
    let (sum, count) = iter.fold((0.0, 0u32), |(s, c), v| (s + v, c + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Character length of the raw prediction.
pub struct PredictionLength;

impl AnalysisFn for PredictionLength {
    fn name(&self) -> &str {
        "length"
    }

    fn compute(&self, _record: &InputRecord, _label: &str, prediction: &str) -> MetricValue {
        MetricValue::Scalar(prediction.chars().count() as f64)
    }
}

/// Per-example equality of normalized prediction and label.
pub struct ExactMatch;

impl AnalysisFn for ExactMatch {
    fn name(&self) -> &str {
        "exact_match"
    }

    fn compute(&self, _record: &InputRecord, label: &str, prediction: &str) -> MetricValue {
        let matched = normalize_label(prediction) == normalize_label(label);
        MetricValue::Text(matched.to_string())
    }

    fn aggregate(&self, _values: &[MetricValue]) -> Option<f64> {
        None
    }
}

/// Percentage of completed predictions that match their label.
pub struct ExactMatchRate;

impl AnalysisFn for ExactMatchRate {
    fn name(&self) -> &str {
        "exact_match_rate"
    }

    fn compute(&self, _record: &InputRecord, label: &str, prediction: &str) -> MetricValue {
        let matched = normalize_label(prediction) == normalize_label(label);
        MetricValue::Scalar(if matched { 1.0 } else { 0.0 })
    }

    fn aggregate(&self, values: &[MetricValue]) -> Option<f64> {
        mean(values.iter().filter_map(MetricValue::as_scalar)).map(|rate| rate * 100.0)
    }
}

/// @ai:intent The analyses used when none are configured
/// @ai:effects pure
pub fn default_analyses() -> Vec<Box<dyn AnalysisFn>> {
    vec![
        Box::new(PredictionLength),
        Box::new(ExactMatch),
        Box::new(ExactMatchRate),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("Positive"), "positive");
        assert_eq!(normalize_label("\n  negative.\nBecause the film..."), "negative");
        assert_eq!(normalize_label("\"neutral\""), "neutral");
        assert_eq!(normalize_label("   "), "");
    }

    #[test]
    fn test_exact_match_uses_normalization() {
        let record = InputRecord::default();
        assert_eq!(
            ExactMatch.compute(&record, "positive", "Positive!\nThe review is glowing."),
            MetricValue::Text("true".to_string())
        );
        assert_eq!(
            ExactMatch.compute(&record, "positive", "negative"),
            MetricValue::Text("false".to_string())
        );
    }

    #[test]
    fn test_exact_match_rate_aggregates_to_percentage() {
        let values = vec![
            MetricValue::Scalar(1.0),
            MetricValue::Scalar(0.0),
            MetricValue::Scalar(1.0),
            MetricValue::Scalar(1.0),
        ];
        let rate = ExactMatchRate.aggregate(&values).unwrap();
        assert!((rate - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_length_counts_characters() {
        let record = InputRecord::default();
        assert_eq!(
            PredictionLength.compute(&record, "x", "héllo"),
            MetricValue::Scalar(5.0)
        );
        assert_eq!(PredictionLength.aggregate(&[]), None);
    }
}
