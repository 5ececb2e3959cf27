//! @ai:module:intent Immutable record of one model's predictions over a dataset
//! @ai:module:layer domain
//! @ai:module:public_api ExperimentRun, RunHandle, run_params
//! @ai:module:stateless true

use crate::config::{GenerationParams, ModelConfig};
use crate::runner::{BatchStats, Prediction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// @ai:intent Opaque reference to a recorded run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunHandle(String);

impl RunHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// @ai:intent A named run with its parameters and ordered predictions
/// @ai:invariant immutable after construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRun {
    name: String,
    created_at: DateTime<Utc>,
    params: BTreeMap<String, Value>,
    predictions: Vec<Prediction>,
}

impl ExperimentRun {
    /// @ai:intent Build a run from a completed batch
    /// @ai:effects time
    pub fn new(name: &str, params: BTreeMap<String, Value>, predictions: Vec<Prediction>) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            params,
            predictions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle::new(&self.name)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    /// @ai:intent Number of failed slots
    /// @ai:effects pure
    pub fn failed_count(&self) -> usize {
        self.predictions.iter().filter(|p| p.is_failed()).count()
    }

    /// @ai:intent Model identifier recorded in the parameters, if any
    /// @ai:effects pure
    pub fn model(&self) -> Option<&str> {
        self.params.get("model").and_then(Value::as_str)
    }
}

/// @ai:intent Flatten the settings and counters of a batch into run parameters
/// @ai:effects pure
pub fn run_params(
    model: &ModelConfig,
    generation: &GenerationParams,
    stats: &BatchStats,
) -> BTreeMap<String, Value> {
    let mut params = BTreeMap::new();

    params.insert("provider".to_string(), Value::from(model.provider.as_str()));
    params.insert("model".to_string(), Value::from(model.model.as_str()));
    params.insert("temperature".to_string(), Value::from(generation.temperature));
    params.insert("max_tokens".to_string(), Value::from(generation.max_tokens));

    if let Some(top_p) = generation.top_p {
        params.insert("top_p".to_string(), Value::from(top_p));
    }

    if let Some(rpm) = generation.requests_per_minute {
        params.insert("requests_per_minute".to_string(), Value::from(rpm));
    }

    params.insert("calls_made".to_string(), Value::from(stats.calls_made));
    params.insert("failed".to_string(), Value::from(stats.failed));
    params.insert("elapsed_ms".to_string(), Value::from(stats.elapsed_ms));

    params
}
