//! @ai:module:intent Runs a batch over a dataset and records it as an experiment run
//! @ai:module:layer application
//! @ai:module:public_api RunRequest, run_experiment
//! @ai:module:stateless true

use crate::config::{GenerationParams, ModelConfig};
use crate::dataset::{InputRecord, LabeledExample};
use crate::experiment::{run_params, ExperimentRecorderTrait, RunHandle};
use crate::runner::{BatchExecutor, BatchStats, CompletionProvider, RateLimiterTrait};
use crate::template::PromptTemplate;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// @ai:intent Everything needed to produce one named run
pub struct RunRequest<'a> {
    pub name: &'a str,
    pub examples: &'a [LabeledExample],
    pub template: &'a PromptTemplate,
    pub model: &'a ModelConfig,
    pub generation: &'a GenerationParams,
}

/// @ai:intent Execute the batch and persist the run only if it completed
/// @ai:pre the run name is accepted by the recorder, checked before any dispatch
/// @ai:post a cancelled batch records nothing
/// @ai:effects network, fs:write
pub async fn run_experiment<P, L, R>(
    executor: &BatchExecutor<P, L>,
    recorder: &R,
    request: RunRequest<'_>,
    cancel: &CancellationToken,
) -> Result<(RunHandle, BatchStats)>
where
    P: CompletionProvider,
    L: RateLimiterTrait,
    R: ExperimentRecorderTrait,
{
    recorder.validate_name(request.name)?;

    let records: Vec<InputRecord> = request
        .examples
        .iter()
        .map(|example| example.record.clone())
        .collect();

    let output = executor
        .execute_cancellable(&records, request.template, request.generation, cancel)
        .await?;

    let params = run_params(request.model, request.generation, &output.stats);
    let handle = recorder.record(request.name, params, output.predictions)?;

    Ok((handle, output.stats))
}
