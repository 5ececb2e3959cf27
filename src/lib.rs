//! @ai:module:intent Rate-limited batch LLM inference with experiment comparison
//! @ai:module:layer application
//! @ai:module:public_api config, dataset, error, experiment, metrics, pipeline, report, runner, template

pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod template;

pub use config::BenchConfig;
pub use error::{BatchError, ConfigError, ProviderError, TemplateError};
pub use experiment::{ExperimentRun, RunHandle};
pub use metrics::ComparisonResults;
pub use runner::{BatchExecutor, BatchOutput, Prediction};
pub use template::PromptTemplate;
