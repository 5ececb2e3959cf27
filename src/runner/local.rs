//! @ai:module:intent Client for a locally served open-weights model (Ollama-compatible)
//! @ai:module:layer infrastructure
//! @ai:module:public_api LocalClient
//! @ai:module:stateless true

use crate::config::{GenerationParams, ModelConfig};
use crate::error::ProviderError;
use crate::runner::provider::{Completion, CompletionProvider};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

/// @ai:intent Local model server client; bounded only by executor concurrency
pub struct LocalClient {
    client: reqwest::Client,
    config: ModelConfig,
}

impl LocalClient {
    /// @ai:intent Create a new local client
    /// @ai:effects pure
    pub fn new(config: ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/api/generate", base.trim_end_matches('/'))
    }
}

impl CompletionProvider for LocalClient {
    /// @ai:intent Generate a completion from the local server
    /// @ai:effects network
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Completion, ProviderError> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
                top_p: params.top_p,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                self.name(),
                &self.config.model,
                status.as_u16(),
                error_text,
            ));
        }

        let body: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::ResponseParse {
                    message: e.to_string(),
                })?;

        Ok(Completion {
            text: body.response,
            input_tokens: body.prompt_eval_count,
            output_tokens: body.eval_count,
        })
    }

    fn is_rate_limited(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_generation_params() {
        let params = GenerationParams {
            temperature: 0.7,
            max_tokens: 8,
            top_p: Some(0.9),
            requests_per_minute: None,
        };
        let request = GenerateRequest {
            model: "llama3",
            prompt: "Review: ok film",
            stream: false,
            options: GenerateOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
                top_p: params.top_p,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["options"]["num_predict"], 8);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_default_endpoint() {
        let client = LocalClient::new(ModelConfig::default()).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
    }
}
