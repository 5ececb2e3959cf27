//! @ai:module:intent Exponential backoff retry for transient provider errors
//! @ai:module:layer infrastructure
//! @ai:module:public_api with_retry, backoff_delay
//! @ai:module:stateless true

use crate::config::RetryConfig;
use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;

/// @ai:intent Run an operation, retrying transient failures with backoff
/// @ai:post returns the first success, the first fatal error, or the last transient error
/// @ai:effects time
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() || attempt >= config.max_retries => return Err(e),
            Err(e) => {
                let delay = backoff_delay(config, attempt, &e);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// @ai:intent Delay before the next attempt, honouring provider retry-after
/// @ai:effects pure
pub fn backoff_delay(config: &RetryConfig, attempt: u32, err: &ProviderError) -> Duration {
    let computed = exponential_backoff_ms(config, attempt);

    let millis = match err {
        ProviderError::RateLimited { retry_after_secs } => {
            computed.max(retry_after_secs.saturating_mul(1000))
        }
        _ => computed,
    };

    Duration::from_millis(millis)
}

fn exponential_backoff_ms(config: &RetryConfig, attempt: u32) -> u64 {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(exponent);
    base.min(config.max_backoff_ms as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let config = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 3000,
            backoff_multiplier: 2.0,
        };
        let err = ProviderError::Timeout { timeout_secs: 1 };

        assert_eq!(backoff_delay(&config, 0, &err), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&config, 1, &err), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&config, 2, &err), Duration::from_millis(3000));
    }

    #[test]
    fn test_backoff_respects_retry_after() {
        let config = RetryConfig::default();
        let err = ProviderError::RateLimited {
            retry_after_secs: 10,
        };
        assert_eq!(backoff_delay(&config, 0, &err), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);

        let result = with_retry(&fast_config(3), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::Timeout { timeout_secs: 1 })
                } else {
                    Ok("positive")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("positive"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&fast_config(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::AuthFailed {
                    provider: "hosted".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::AuthFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&fast_config(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::RateLimited {
                    retry_after_secs: 0,
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
