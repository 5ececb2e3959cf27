//! @ai:module:intent Error types for template rendering, providers and batch configuration
//! @ai:module:layer domain
//! @ai:module:public_api TemplateError, ProviderError, ConfigError, BatchError
//! @ai:module:stateless true

use thiserror::Error;

/// @ai:intent A prompt template could not be rendered for one record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Missing placeholder '{name}' in input record")]
    MissingPlaceholder { name: String },

    #[error("Unterminated placeholder at byte {offset}")]
    Unterminated { offset: usize },
}

/// @ai:intent Failure of a single completion call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Provider server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid model identifier: {model}")]
    InvalidModel { model: String },

    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse provider response: {message}")]
    ResponseParse { message: String },

    #[error("Provider returned an empty completion")]
    EmptyCompletion,
}

impl ProviderError {
    /// @ai:intent Whether the error is worth retrying
    /// @ai:effects pure
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. }
                | ProviderError::RateLimited { .. }
                | ProviderError::Connection { .. }
                | ProviderError::Server { .. }
        )
    }

    /// @ai:intent Map an HTTP status and body to a provider error
    /// @ai:effects pure
    pub fn from_status(provider: &str, model: &str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::AuthFailed {
                provider: provider.to_string(),
            },
            404 => ProviderError::InvalidModel {
                model: model.to_string(),
            },
            408 => ProviderError::Timeout { timeout_secs: 0 },
            429 => ProviderError::RateLimited {
                retry_after_secs: 0,
            },
            500..=599 => ProviderError::Server {
                status,
                message: body,
            },
            _ => ProviderError::Api {
                status,
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { timeout_secs: 0 }
        } else if err.is_decode() {
            ProviderError::ResponseParse {
                message: err.to_string(),
            }
        } else {
            ProviderError::Connection {
                message: err.to_string(),
            }
        }
    }
}

/// @ai:intent Nonsensical run configuration rejected before dispatch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("requests_per_minute must not be negative (got {0})")]
    NegativeRateLimit(i64),

    #[error("requests_per_minute {0} exceeds the supported maximum of 4294967295")]
    RateLimitTooLarge(i64),

    #[error("top_p must be within 0.0..=1.0 (got {0})")]
    InvalidTopP(f32),

    #[error("temperature must not be negative (got {0})")]
    InvalidTemperature(f32),

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
}

/// @ai:intent Reasons a whole batch did not produce output
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Batch was cancelled before completion")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout { timeout_secs: 30 }.is_transient());
        assert!(ProviderError::RateLimited {
            retry_after_secs: 1
        }
        .is_transient());
        assert!(ProviderError::Server {
            status: 503,
            message: "overloaded".to_string()
        }
        .is_transient());
        assert!(!ProviderError::AuthFailed {
            provider: "hosted".to_string()
        }
        .is_transient());
        assert!(!ProviderError::EmptyCompletion.is_transient());
    }

    #[test]
    fn test_from_status() {
        assert_eq!(
            ProviderError::from_status("hosted", "m", 401, String::new()),
            ProviderError::AuthFailed {
                provider: "hosted".to_string()
            }
        );
        assert_eq!(
            ProviderError::from_status("hosted", "bogus", 404, String::new()),
            ProviderError::InvalidModel {
                model: "bogus".to_string()
            }
        );
        assert!(ProviderError::from_status("hosted", "m", 429, String::new()).is_transient());
        assert!(!ProviderError::from_status("hosted", "m", 400, "bad".to_string()).is_transient());
    }
}
