//! @ai:module:intent Analysis functions and cross-run aggregation
//! @ai:module:layer application
//! @ai:module:public_api AnalysisFn, MetricValue, RunSummary, ComparisonResults, ComparisonAggregator

pub mod aggregator;
pub mod analysis;
pub mod types;

pub use aggregator::{ComparisonAggregator, ComparisonAggregatorTrait};
pub use analysis::{
    default_analyses, normalize_label, AnalysisFn, ExactMatch, ExactMatchRate, PredictionLength,
};
pub use types::{
    ComparisonResults, ExampleRow, MetricValue, PairwiseAgreement, RunCell, RunSummary,
};
