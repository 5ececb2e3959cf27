//! @ai:module:intent Experiment runs and their persistence
//! @ai:module:layer application
//! @ai:module:public_api ExperimentRun, RunHandle, ExperimentRecorderTrait, JsonRecorder

pub mod recorder;
pub mod run;

pub use recorder::{ExperimentRecorderTrait, JsonRecorder};
pub use run::{run_params, ExperimentRun, RunHandle};
