//! @ai:module:intent Persists experiment runs as JSON documents
//! @ai:module:layer infrastructure
//! @ai:module:public_api ExperimentRecorderTrait, JsonRecorder
//! @ai:module:stateless true

use crate::experiment::run::{ExperimentRun, RunHandle};
use crate::runner::Prediction;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// @ai:intent Stores named runs and hands back handles for later comparison
pub trait ExperimentRecorderTrait: Send + Sync {
    /// @ai:intent Record a completed run
    fn record(
        &self,
        name: &str,
        params: BTreeMap<String, Value>,
        predictions: Vec<Prediction>,
    ) -> Result<RunHandle>;

    /// @ai:intent Load a previously recorded run
    fn load(&self, handle: &RunHandle) -> Result<ExperimentRun>;

    /// @ai:intent Handles of every recorded run, sorted by name
    fn list(&self) -> Result<Vec<RunHandle>>;

    /// @ai:intent Check that `record` would accept this name
    /// @ai:effects pure
    fn validate_name(&self, name: &str) -> Result<()>;
}

/// @ai:intent Writes one `<name>.json` file per run under a directory
pub struct JsonRecorder {
    runs_dir: PathBuf,
}

impl JsonRecorder {
    /// @ai:intent Create a recorder rooted at `<results_dir>/runs`
    /// @ai:effects pure
    pub fn new(results_dir: &Path) -> Self {
        Self {
            runs_dir: results_dir.join("runs"),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    fn run_path(&self, name: &str) -> PathBuf {
        self.runs_dir.join(format!("{}.json", name))
    }

    /// @ai:intent Reject names that are empty or escape the runs directory
    /// @ai:effects pure
    fn check_name(name: &str) -> Result<()> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !name.starts_with('.');

        if !valid {
            anyhow::bail!(
                "Invalid run name '{}': use letters, digits, '-', '_' or '.'",
                name
            );
        }

        Ok(())
    }
}

impl ExperimentRecorderTrait for JsonRecorder {
    /// @ai:intent Save the run, replacing any run of the same name
    /// @ai:effects fs:write
    fn record(
        &self,
        name: &str,
        params: BTreeMap<String, Value>,
        predictions: Vec<Prediction>,
    ) -> Result<RunHandle> {
        Self::check_name(name)?;

        let run = ExperimentRun::new(name, params, predictions);
        let path = self.run_path(name);

        std::fs::create_dir_all(&self.runs_dir)
            .with_context(|| format!("Failed to create {}", self.runs_dir.display()))?;

        if path.exists() {
            tracing::warn!("Overwriting existing run {}", name);
        }

        let json = serde_json::to_string_pretty(&run)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write run file: {}", path.display()))?;

        tracing::info!("Recorded run {} to {}", name, path.display());
        Ok(run.handle())
    }

    /// @ai:intent Read a run back from disk
    /// @ai:effects fs:read
    fn load(&self, handle: &RunHandle) -> Result<ExperimentRun> {
        let path = self.run_path(handle.as_str());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Run '{}' not found at {}", handle, path.display()))?;

        let run: ExperimentRun = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse run file: {}", path.display()))?;
        Ok(run)
    }

    /// @ai:intent List run files in the runs directory
    /// @ai:effects fs:read
    fn list(&self) -> Result<Vec<RunHandle>> {
        if !self.runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut handles: Vec<RunHandle> = WalkDir::new(&self.runs_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "json")
                    .unwrap_or(false)
            })
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(RunHandle::new)
            })
            .collect();

        handles.sort();
        Ok(handles)
    }

    fn validate_name(&self, name: &str) -> Result<()> {
        Self::check_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_record_and_load() {
        let temp = TempDir::new().unwrap();
        let recorder = JsonRecorder::new(temp.path());
        let predictions = vec![
            Prediction::completed("positive"),
            Prediction::failed("Provider returned an empty completion"),
        ];

        let handle = recorder
            .record("hosted-sonnet", BTreeMap::new(), predictions.clone())
            .unwrap();
        let run = recorder.load(&handle).unwrap();

        assert_eq!(run.name(), "hosted-sonnet");
        assert_eq!(run.predictions(), predictions.as_slice());
    }

    #[test]
    fn test_list_is_sorted() {
        let temp = TempDir::new().unwrap();
        let recorder = JsonRecorder::new(temp.path());

        recorder.record("b-run", BTreeMap::new(), vec![]).unwrap();
        recorder.record("a-run", BTreeMap::new(), vec![]).unwrap();

        let handles = recorder.list().unwrap();
        assert_eq!(handles, vec![RunHandle::new("a-run"), RunHandle::new("b-run")]);
    }

    #[test]
    fn test_list_without_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let recorder = JsonRecorder::new(&temp.path().join("missing"));
        assert!(recorder.list().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let temp = TempDir::new().unwrap();
        let recorder = JsonRecorder::new(temp.path());

        assert!(recorder.record("../escape", BTreeMap::new(), vec![]).is_err());
        assert!(recorder.record("", BTreeMap::new(), vec![]).is_err());
    }

    #[test]
    fn test_validate_name_matches_record() {
        let temp = TempDir::new().unwrap();
        let recorder = JsonRecorder::new(temp.path());

        assert!(recorder.validate_name("claude-sonnet_2026.1").is_ok());
        assert!(recorder.validate_name("my run").is_err());
        assert!(recorder.validate_name(".hidden").is_err());
    }

    #[test]
    fn test_load_missing_run() {
        let temp = TempDir::new().unwrap();
        let recorder = JsonRecorder::new(temp.path());
        let err = recorder.load(&RunHandle::new("nope")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
