//! @ai:module:intent Rate-limited, order-preserving batch prompt execution
//! @ai:module:layer application
//! @ai:module:public_api BatchExecutor, BatchOutput, BatchStats, Prediction
//! @ai:module:stateless false

use crate::config::{GenerationParams, RetryConfig, RunConfig};
use crate::dataset::InputRecord;
use crate::error::{BatchError, ProviderError};
use crate::runner::provider::{Completion, CompletionProvider};
use crate::runner::rate_limiter::{RateLimiter, RateLimiterTrait};
use crate::runner::retry::with_retry;
use crate::template::PromptTemplate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// @ai:intent Output slot for one input record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Prediction {
    Completed { text: String },
    /// Sentinel for a record that produced no usable completion
    Failed { reason: String },
}

impl Prediction {
    pub fn completed(text: impl Into<String>) -> Self {
        Prediction::Completed { text: text.into() }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Prediction::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Prediction::Failed { .. })
    }

    /// @ai:intent Completion text, or None for a failed slot
    /// @ai:effects pure
    pub fn text(&self) -> Option<&str> {
        match self {
            Prediction::Completed { text } => Some(text),
            Prediction::Failed { .. } => None,
        }
    }
}

/// @ai:intent Counters describing one batch execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Provider calls issued, retries included
    pub calls_made: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub elapsed_ms: u64,
}

/// @ai:intent Predictions in input order plus batch counters
/// @ai:invariant predictions.len() == number of input records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub predictions: Vec<Prediction>,
    pub stats: BatchStats,
}

struct SlotResult {
    index: usize,
    prediction: Prediction,
    usage: Option<(u32, u32)>,
}

/// @ai:intent Executes a prompt template over many records against one provider
pub struct BatchExecutor<P: CompletionProvider, L: RateLimiterTrait = RateLimiter> {
    provider: Arc<P>,
    limiter: Option<Arc<L>>,
    retry: RetryConfig,
    max_concurrency: usize,
}

impl<P: CompletionProvider> BatchExecutor<P, RateLimiter> {
    /// @ai:intent Create an executor that builds its limiter from requests_per_minute
    /// @ai:effects pure
    pub fn new(provider: Arc<P>, run_config: &RunConfig) -> Self {
        Self {
            provider,
            limiter: None,
            retry: run_config.retry.clone(),
            max_concurrency: run_config.max_concurrency.max(1),
        }
    }
}

impl<P: CompletionProvider, L: RateLimiterTrait> BatchExecutor<P, L> {
    /// @ai:intent Replace the limiter with an injected one
    /// @ai:effects pure
    pub fn with_rate_limiter<L2: RateLimiterTrait>(self, limiter: Arc<L2>) -> BatchExecutor<P, L2> {
        BatchExecutor {
            provider: self.provider,
            limiter: Some(limiter),
            retry: self.retry,
            max_concurrency: self.max_concurrency,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// @ai:intent Run the whole batch to completion
    /// @ai:pre params pass validation
    /// @ai:post output is order-aligned and has one slot per record
    /// @ai:effects network, time
    pub async fn execute(
        &self,
        records: &[InputRecord],
        template: &PromptTemplate,
        params: &GenerationParams,
    ) -> Result<BatchOutput, BatchError> {
        self.execute_cancellable(records, template, params, &CancellationToken::new())
            .await
    }

    /// @ai:intent Run the batch, abandoning in-flight calls if cancelled
    /// @ai:effects network, time
    pub async fn execute_cancellable(
        &self,
        records: &[InputRecord],
        template: &PromptTemplate,
        params: &GenerationParams,
        cancel: &CancellationToken,
    ) -> Result<BatchOutput, BatchError> {
        params.validate()?;
        let rate_limit = params.rate_limit()?;

        let throttle = self.provider.is_rate_limited() && rate_limit.is_some();
        let injected = self.limiter.as_deref().filter(|_| throttle);
        let built = match rate_limit {
            Some(rpm) if throttle && injected.is_none() => Some(RateLimiter::per_minute(rpm)),
            _ => None,
        };

        tracing::info!(
            records = records.len(),
            provider = self.provider.name(),
            requests_per_minute = rate_limit.unwrap_or(0),
            max_concurrency = self.max_concurrency,
            "Starting batch"
        );

        let start = Instant::now();
        let calls = AtomicUsize::new(0);

        let dispatch = async {
            match injected {
                Some(limiter) => {
                    self.dispatch_all(records, template, params, Some(limiter), &calls)
                        .await
                }
                None => {
                    self.dispatch_all(records, template, params, built.as_ref(), &calls)
                        .await
                }
            }
        };

        let slots = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Batch cancelled; discarding partial results");
                return Err(BatchError::Cancelled);
            }
            slots = dispatch => slots,
        };

        let output = Self::assemble(slots, calls.load(Ordering::SeqCst), start);

        tracing::info!(
            completed = output.stats.completed,
            failed = output.stats.failed,
            calls = output.stats.calls_made,
            elapsed_ms = output.stats.elapsed_ms,
            "Batch finished"
        );

        Ok(output)
    }

    /// @ai:intent Dispatch every record concurrently, up to max_concurrency
    /// @ai:effects network, time
    async fn dispatch_all<R: RateLimiterTrait>(
        &self,
        records: &[InputRecord],
        template: &PromptTemplate,
        params: &GenerationParams,
        limiter: Option<&R>,
        calls: &AtomicUsize,
    ) -> Vec<SlotResult> {
        stream::iter(records.iter().enumerate())
            .map(|(index, record)| self.run_slot(index, record, template, params, limiter, calls))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await
    }

    /// @ai:intent Render, throttle, call and retry for a single record
    /// @ai:effects network, time
    async fn run_slot<R: RateLimiterTrait>(
        &self,
        index: usize,
        record: &InputRecord,
        template: &PromptTemplate,
        params: &GenerationParams,
        limiter: Option<&R>,
        calls: &AtomicUsize,
    ) -> SlotResult {
        let prompt = match template.render(record) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(index, error = %e, "Template rendering failed");
                return SlotResult {
                    index,
                    prediction: Prediction::failed(e.to_string()),
                    usage: None,
                };
            }
        };

        let provider = self.provider.as_ref();
        let prompt = prompt.as_str();

        let result = with_retry(&self.retry, move |attempt| async move {
            if let Some(limiter) = limiter {
                limiter.acquire().await;
            }

            calls.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(index, attempt, "Dispatching prompt");

            let completion = provider.complete(prompt, params).await?;
            ensure_non_empty(completion)
        })
        .await;

        match result {
            Ok(completion) => SlotResult {
                index,
                usage: Some((completion.input_tokens, completion.output_tokens)),
                prediction: Prediction::completed(completion.text),
            },
            Err(e) => {
                tracing::warn!(index, error = %e, "Record failed");
                SlotResult {
                    index,
                    prediction: Prediction::failed(e.to_string()),
                    usage: None,
                }
            }
        }
    }

    /// @ai:intent Restore input order and compute counters
    /// @ai:effects pure
    fn assemble(mut slots: Vec<SlotResult>, calls_made: usize, start: Instant) -> BatchOutput {
        slots.sort_by_key(|slot| slot.index);

        let mut stats = BatchStats {
            total: slots.len(),
            calls_made,
            ..Default::default()
        };

        for slot in &slots {
            if slot.prediction.is_failed() {
                stats.failed += 1;
            } else {
                stats.completed += 1;
            }

            if let Some((input, output)) = slot.usage {
                stats.input_tokens += input as u64;
                stats.output_tokens += output as u64;
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;

        BatchOutput {
            predictions: slots.into_iter().map(|slot| slot.prediction).collect(),
            stats,
        }
    }
}

/// Empty or whitespace-only completions count as failures.
fn ensure_non_empty(completion: Completion) -> Result<Completion, ProviderError> {
    if completion.text.trim().is_empty() {
        Err(ProviderError::EmptyCompletion)
    } else {
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::provider::MockProvider;
    use crate::runner::rate_limiter::Unthrottled;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn records(texts: &[&str]) -> Vec<InputRecord> {
        texts
            .iter()
            .map(|text| InputRecord::from_iter([("text", *text)]))
            .collect()
    }

    fn fast_run_config() -> RunConfig {
        RunConfig {
            max_concurrency: 4,
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                backoff_multiplier: 2.0,
            },
            ..Default::default()
        }
    }

    fn template() -> PromptTemplate {
        PromptTemplate::parse("Review: {{text}}\nA:").unwrap()
    }

    #[tokio::test]
    async fn test_out_of_order_completion_is_resorted() {
        // Earlier records finish last
        let provider = Arc::new(
            MockProvider::with_responder(|prompt| Ok(prompt.to_string())).with_delay(|prompt| {
                if prompt.contains("first") {
                    Duration::from_millis(60)
                } else if prompt.contains("second") {
                    Duration::from_millis(30)
                } else {
                    Duration::from_millis(1)
                }
            }),
        );
        let executor = BatchExecutor::new(Arc::clone(&provider), &fast_run_config());
        let input = records(&["first", "second", "third"]);

        let output = executor
            .execute(&input, &template(), &GenerationParams::default())
            .await
            .unwrap();

        let texts: Vec<_> = output.predictions.iter().map(|p| p.text().unwrap()).collect();
        assert_eq!(
            texts,
            vec!["Review: first\nA:", "Review: second\nA:", "Review: third\nA:"]
        );
    }

    #[tokio::test]
    async fn test_empty_completion_marks_slot_failed() {
        let provider = Arc::new(MockProvider::with_responder(|prompt| {
            if prompt.contains("blank") {
                Ok("   ".to_string())
            } else {
                Ok("positive".to_string())
            }
        }));
        let executor = BatchExecutor::new(Arc::clone(&provider), &fast_run_config());

        let output = executor
            .execute(&records(&["blank", "fine"]), &template(), &GenerationParams::default())
            .await
            .unwrap();

        assert!(output.predictions[0].is_failed());
        assert_eq!(output.predictions[1], Prediction::completed("positive"));
        // Empty completions are not retried
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_per_record() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let provider = Arc::new(MockProvider::with_responder(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::RateLimited {
                    retry_after_secs: 0,
                })
            } else {
                Ok("negative".to_string())
            }
        }));
        let executor = BatchExecutor::new(Arc::clone(&provider), &fast_run_config());

        let output = executor
            .execute(&records(&["bad film"]), &template(), &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(output.predictions, vec![Prediction::completed("negative")]);
        assert_eq!(output.stats.calls_made, 2);
    }

    #[tokio::test]
    async fn test_negative_rate_limit_fails_before_dispatch() {
        let provider = Arc::new(MockProvider::new("positive"));
        let executor = BatchExecutor::new(Arc::clone(&provider), &fast_run_config());
        let params = GenerationParams {
            requests_per_minute: Some(-1),
            ..Default::default()
        };

        let result = executor.execute(&records(&["great film"]), &template(), &params).await;

        assert!(matches!(result, Err(BatchError::Config(_))));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_limiter_throttles_dispatch() {
        let window = Duration::from_millis(150);
        let provider = Arc::new(MockProvider::new("positive"));
        let executor = BatchExecutor::new(Arc::clone(&provider), &fast_run_config())
            .with_rate_limiter(Arc::new(RateLimiter::with_window(2, window)));
        let params = GenerationParams {
            requests_per_minute: Some(2),
            ..Default::default()
        };

        let output = executor
            .execute(&records(&["a", "b", "c", "d", "e"]), &template(), &params)
            .await
            .unwrap();

        assert_eq!(output.stats.completed, 5);

        let mut times = provider.dispatch_times();
        times.sort();
        for span in times.windows(3) {
            assert!(span[2].duration_since(span[0]) >= window - Duration::from_millis(5));
        }
    }

    #[tokio::test]
    async fn test_unthrottled_provider_ignores_rate_limit() {
        let provider = Arc::new(MockProvider::new("positive").unthrottled());
        let executor = BatchExecutor::new(Arc::clone(&provider), &fast_run_config())
            .with_rate_limiter(Arc::new(RateLimiter::with_window(1, Duration::from_secs(60))));
        let params = GenerationParams {
            requests_per_minute: Some(1),
            ..Default::default()
        };

        let start = Instant::now();
        let output = executor
            .execute(&records(&["a", "b", "c"]), &template(), &params)
            .await
            .unwrap();

        assert_eq!(output.stats.completed, 3);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_cancelled_batch_returns_no_output() {
        let provider = Arc::new(
            MockProvider::new("positive").with_delay(|_| Duration::from_secs(5)),
        );
        let executor = BatchExecutor::new(Arc::clone(&provider), &fast_run_config())
            .with_rate_limiter(Arc::new(Unthrottled));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = executor
            .execute_cancellable(
                &records(&["a", "b"]),
                &template(),
                &GenerationParams::default(),
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(BatchError::Cancelled)));
    }
}
