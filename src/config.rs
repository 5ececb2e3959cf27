//! @ai:module:intent Configuration structs for batch inference runs
//! @ai:module:layer infrastructure
//! @ai:module:public_api BenchConfig, ModelConfig, ProviderKind, GenerationParams, RunConfig, RetryConfig, PathConfig
//! @ai:module:stateless true

use crate::error::ConfigError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// @ai:intent Main configuration for the batch bench
/// @ai:effects pure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub generation: GenerationParams,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub paths: PathConfig,
}

/// @ai:intent Backing model-serving mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted Messages API, throttled client-side
    Hosted,
    /// Locally served open-weights model (Ollama-compatible)
    Local,
    /// Deterministic in-process provider for dry runs
    Mock,
}

impl ProviderKind {
    /// @ai:intent Get string representation
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Hosted => "hosted",
            ProviderKind::Local => "local",
            ProviderKind::Mock => "mock",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hosted" | "anthropic" => Ok(ProviderKind::Hosted),
            "local" | "ollama" => Ok(ProviderKind::Local),
            "mock" => Ok(ProviderKind::Mock),
            other => anyhow::bail!("Unknown provider '{}' (expected hosted, local or mock)", other),
        }
    }
}

/// @ai:intent Identifies which provider and model serve completions
/// @ai:effects pure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the provider's default endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// @ai:intent Sampling and throttling options for a batch
/// @ai:effects pure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub top_p: Option<f32>,
    /// None or 0 disables client-side throttling
    #[serde(default)]
    pub requests_per_minute: Option<i64>,
}

/// @ai:intent Run configuration for batch execution
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub dry_run: bool,
    /// Only the first N dataset examples are used
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// @ai:intent Exponential backoff settings for transient provider errors
/// @ai:effects pure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

/// @ai:intent Path configuration for inputs and recorded runs
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_dataset")]
    pub dataset: PathBuf,
    #[serde(default = "default_template_file")]
    pub template_file: PathBuf,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            top_p: None,
            requests_per_minute: None,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            dry_run: false,
            limit: None,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            template_file: default_template_file(),
            results_dir: default_results_dir(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::Hosted
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    16
}

fn default_max_concurrency() -> usize {
    8
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_dataset() -> PathBuf {
    PathBuf::from("data/sentiment.jsonl")
}

fn default_template_file() -> PathBuf {
    PathBuf::from("prompts/sentiment.txt")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

impl GenerationParams {
    /// @ai:intent Resolve the throttling cap, rejecting nonsensical values
    /// @ai:post Ok(None) means unthrottled
    /// @ai:effects pure
    pub fn rate_limit(&self) -> Result<Option<u32>, ConfigError> {
        match self.requests_per_minute {
            None | Some(0) => Ok(None),
            Some(rpm) if rpm < 0 => Err(ConfigError::NegativeRateLimit(rpm)),
            Some(rpm) => u32::try_from(rpm)
                .map(Some)
                .map_err(|_| ConfigError::RateLimitTooLarge(rpm)),
        }
    }

    /// @ai:intent Check sampling options and throttling before any dispatch
    /// @ai:effects pure
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit()?;

        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(ConfigError::InvalidTopP(top_p));
            }
        }

        if self.temperature < 0.0 {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        Ok(())
    }
}

impl BenchConfig {
    /// @ai:intent Load configuration from a TOML file
    /// @ai:pre path exists and is readable
    /// @ai:effects fs:read
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// @ai:intent Save configuration to a TOML file
    /// @ai:effects fs:write
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// @ai:intent Load the given config, else ./bench.toml, else defaults
    /// @ai:effects fs:read
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new("bench.toml");

                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// @ai:intent Fail fast on configuration that cannot drive a batch
    /// @ai:effects pure
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generation.validate()?;

        if self.run.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_rate_limit_unset_or_zero_is_unthrottled() {
        let mut params = GenerationParams::default();
        assert_eq!(params.rate_limit(), Ok(None));

        params.requests_per_minute = Some(0);
        assert_eq!(params.rate_limit(), Ok(None));

        params.requests_per_minute = Some(400);
        assert_eq!(params.rate_limit(), Ok(Some(400)));
    }

    #[test]
    fn test_negative_rate_limit_rejected() {
        let params = GenerationParams {
            requests_per_minute: Some(-5),
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::NegativeRateLimit(-5)));
    }

    #[test]
    fn test_top_p_out_of_range_rejected() {
        let params = GenerationParams {
            top_p: Some(1.5),
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(ConfigError::InvalidTopP(1.5)));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = BenchConfig::default();
        config.run.max_concurrency = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroConcurrency));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BenchConfig = toml::from_str(
            r#"
[model]
provider = "local"
model = "llama3"

[generation]
requests_per_minute = 400
"#,
        )
        .unwrap();

        assert_eq!(config.model.provider, ProviderKind::Local);
        assert_eq!(config.model.model, "llama3");
        assert_eq!(config.generation.requests_per_minute, Some(400));
        assert_eq!(config.generation.max_tokens, 16);
        assert_eq!(config.run.retry.max_retries, 3);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bench.toml");

        let mut config = BenchConfig::default();
        config.generation.top_p = Some(0.9);
        config.save(&path).unwrap();

        let loaded = BenchConfig::load(&path).unwrap();
        assert_eq!(loaded.generation, config.generation);
        assert_eq!(loaded.model, config.model);
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert_eq!("Hosted".parse::<ProviderKind>().unwrap(), ProviderKind::Hosted);
        assert!("gpu".parse::<ProviderKind>().is_err());
    }
}
