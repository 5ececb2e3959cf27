//! @ai:module:intent Batch prompt execution and model providers
//! @ai:module:layer infrastructure
//! @ai:module:public_api BatchExecutor, CompletionProvider, Provider, HostedClient, LocalClient, MockProvider, RateLimiter

pub mod executor;
pub mod hosted;
pub mod local;
pub mod provider;
pub mod rate_limiter;
pub mod retry;

pub use executor::{BatchExecutor, BatchOutput, BatchStats, Prediction};
pub use hosted::HostedClient;
pub use local::LocalClient;
pub use provider::{create_provider, Completion, CompletionProvider, MockProvider, Provider};
pub use rate_limiter::{RateLimiter, RateLimiterTrait, Unthrottled};
pub use retry::{backoff_delay, with_retry};
