//! @ai:module:intent Completion provider capability and its variants
//! @ai:module:layer infrastructure
//! @ai:module:public_api CompletionProvider, Completion, Provider, MockProvider, create_provider
//! @ai:module:stateless false

use crate::config::{GenerationParams, ModelConfig, ProviderKind};
use crate::error::ProviderError;
use crate::runner::hosted::HostedClient;
use crate::runner::local::LocalClient;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// @ai:intent Text returned by a provider for one prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

/// @ai:intent Single capability every model backend offers
pub trait CompletionProvider: Send + Sync {
    /// @ai:intent Complete one rendered prompt
    fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> impl std::future::Future<Output = Result<Completion, ProviderError>> + Send;

    /// @ai:intent Whether client-side throttling applies to this backend
    fn is_rate_limited(&self) -> bool;

    /// @ai:intent Short provider tag used in logs and run parameters
    fn name(&self) -> &str;
}

/// @ai:intent Tagged provider variant selected from configuration
pub enum Provider {
    Hosted(HostedClient),
    Local(LocalClient),
    Mock(MockProvider),
}

impl CompletionProvider for Provider {
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Completion, ProviderError> {
        match self {
            Provider::Hosted(client) => client.complete(prompt, params).await,
            Provider::Local(client) => client.complete(prompt, params).await,
            Provider::Mock(client) => client.complete(prompt, params).await,
        }
    }

    fn is_rate_limited(&self) -> bool {
        match self {
            Provider::Hosted(client) => client.is_rate_limited(),
            Provider::Local(client) => client.is_rate_limited(),
            Provider::Mock(client) => client.is_rate_limited(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Provider::Hosted(client) => client.name(),
            Provider::Local(client) => client.name(),
            Provider::Mock(client) => client.name(),
        }
    }
}

/// @ai:intent Build the provider for a model configuration
/// @ai:pre hosted providers need their API key variable set
/// @ai:effects env
pub fn create_provider(config: &ModelConfig, dry_run: bool) -> Result<Provider> {
    if dry_run {
        return Ok(Provider::Mock(MockProvider::dry_run()));
    }

    let provider = match config.provider {
        ProviderKind::Hosted => Provider::Hosted(HostedClient::new(config.clone())?),
        ProviderKind::Local => Provider::Local(LocalClient::new(config.clone())?),
        ProviderKind::Mock => Provider::Mock(MockProvider::dry_run()),
    };

    Ok(provider)
}

type Responder = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;
type Delay = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// @ai:intent Scriptable in-process provider for dry runs and tests
pub struct MockProvider {
    responder: Responder,
    delay: Option<Delay>,
    rate_limited: bool,
    calls: AtomicUsize,
    dispatched: Mutex<Vec<Instant>>,
}

impl MockProvider {
    /// @ai:intent Create a mock that returns a fixed response
    /// @ai:effects pure
    pub fn new(response: impl Into<String>) -> Self {
        let response = response.into();
        Self::with_responder(move |_| Ok(response.clone()))
    }

    /// @ai:intent Mock used when no API calls should be made
    /// @ai:effects pure
    pub fn dry_run() -> Self {
        Self::new("[DRY RUN] No actual API call made")
    }

    /// @ai:intent Create a mock whose answer is computed from the prompt
    /// @ai:effects pure
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            rate_limited: true,
            calls: AtomicUsize::new(0),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    /// @ai:intent Simulate per-prompt latency
    /// @ai:effects pure
    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    /// @ai:intent Behave like a local backend that is never throttled
    /// @ai:effects pure
    pub fn unthrottled(mut self) -> Self {
        self.rate_limited = false;
        self
    }

    /// Number of `complete` calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Instants at which each call arrived, in arrival order
    pub fn dispatch_times(&self) -> Vec<Instant> {
        self.dispatched
            .lock()
            .map(|times| times.clone())
            .unwrap_or_default()
    }
}

impl CompletionProvider for MockProvider {
    async fn complete(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut times) = self.dispatched.lock() {
            times.push(Instant::now());
        }

        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(prompt)).await;
        }

        let text = (self.responder)(prompt)?;

        Ok(Completion {
            input_tokens: prompt.split_whitespace().count() as u32,
            output_tokens: text.split_whitespace().count() as u32,
            text,
        })
    }

    fn is_rate_limited(&self) -> bool {
        self.rate_limited
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_counts_calls() {
        let provider = MockProvider::new("positive");
        let params = GenerationParams::default();

        let completion = provider.complete("Review: great film", &params).await.unwrap();
        assert_eq!(completion.text, "positive");
        assert_eq!(completion.input_tokens, 3);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.dispatch_times().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_responder_can_fail() {
        let provider = MockProvider::with_responder(|prompt| {
            if prompt.contains("bad") {
                Err(ProviderError::InvalidModel {
                    model: "m".to_string(),
                })
            } else {
                Ok("ok".to_string())
            }
        });
        let params = GenerationParams::default();

        assert!(provider.complete("bad film", &params).await.is_err());
        assert!(provider.complete("good film", &params).await.is_ok());
    }

    #[test]
    fn test_create_provider_dry_run_is_mock() {
        let provider = create_provider(&ModelConfig::default(), true).unwrap();
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn test_create_local_provider_is_not_rate_limited() {
        let config = ModelConfig {
            provider: ProviderKind::Local,
            model: "llama3".to_string(),
            ..Default::default()
        };
        let provider = create_provider(&config, false).unwrap();
        assert_eq!(provider.name(), "local");
        assert!(!provider.is_rate_limited());
    }
}
