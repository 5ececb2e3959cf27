//! @ai:module:intent Hosted Messages API client
//! @ai:module:layer infrastructure
//! @ai:module:public_api HostedClient
//! @ai:module:stateless false

use crate::config::{GenerationParams, ModelConfig};
use crate::error::ProviderError;
use crate::runner::provider::{Completion, CompletionProvider};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// @ai:intent Messages API request body
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// @ai:intent Messages API response body
#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// @ai:intent Hosted API client; throttled client-side by the executor
pub struct HostedClient {
    client: reqwest::Client,
    config: ModelConfig,
    api_key: String,
}

impl HostedClient {
    /// @ai:intent Create a new hosted client
    /// @ai:pre the configured API key environment variable is set
    /// @ai:effects env
    pub fn new(config: ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} not set in environment", config.api_key_env))?;

        Self::with_api_key(config, api_key)
    }

    /// @ai:intent Create a client with an explicit key
    /// @ai:effects pure
    pub fn with_api_key(config: ModelConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/v1/messages", base.trim_end_matches('/'))
    }
}

/// @ai:intent Seconds from a `retry-after` header, if present and numeric
/// @ai:effects pure
fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

impl CompletionProvider for HostedClient {
    /// @ai:intent Send one prompt to the Messages API
    /// @ai:effects network
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Completion, ProviderError> {
        let request = ApiRequest {
            model: &self.config.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| match ProviderError::from(e) {
                ProviderError::Timeout { .. } => ProviderError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                },
                other => other,
            })?;

        let status = response.status();

        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let error_text = response.text().await.unwrap_or_default();

            return Err(
                match ProviderError::from_status(self.name(), &self.config.model, status.as_u16(), error_text) {
                    ProviderError::RateLimited { .. } => ProviderError::RateLimited {
                        retry_after_secs: retry_after.unwrap_or(0),
                    },
                    other => other,
                },
            );
        }

        let api_response: ApiResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::ResponseParse {
                    message: e.to_string(),
                })?;

        let text = join_text_blocks(api_response.content);

        Ok(Completion {
            text,
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        })
    }

    fn is_rate_limited(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "hosted"
    }
}

/// Non-text blocks deserialize with empty text and are skipped.
fn join_text_blocks(blocks: Vec<ContentBlock>) -> String {
    blocks
        .into_iter()
        .map(|block| block.text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
