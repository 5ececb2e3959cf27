//! @ai:module:intent Rate limiting for provider requests
//! @ai:module:layer infrastructure
//! @ai:module:public_api RateLimiter, RateLimiterTrait, Unthrottled
//! @ai:module:stateless false

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// @ai:intent Trait for rate limiting functionality
pub trait RateLimiterTrait: Send + Sync {
    /// @ai:intent Wait until a request slot is available, then take it
    fn acquire(&self) -> impl std::future::Future<Output = ()> + Send;
}

/// @ai:intent Sliding-window limiter: at most `capacity` acquisitions per rolling window
pub struct RateLimiter {
    grants: Mutex<VecDeque<Instant>>,
    capacity: usize,
    window: Duration,
}

impl RateLimiter {
    /// @ai:intent Create a limiter allowing `requests_per_minute` per rolling minute
    /// @ai:pre requests_per_minute > 0
    /// @ai:effects pure
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, Duration::from_secs(60))
    }

    /// @ai:intent Create a limiter with an arbitrary window length
    /// @ai:pre capacity > 0
    /// @ai:effects pure
    pub fn with_window(capacity: u32, window: Duration) -> Self {
        let capacity = capacity.max(1) as usize;

        Self {
            grants: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            window,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// @ai:intent Drop grants that have left the window
    /// @ai:effects state:write
    fn prune(grants: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while grants
            .front()
            .is_some_and(|granted| now.duration_since(*granted) >= window)
        {
            grants.pop_front();
        }
    }
}

impl RateLimiterTrait for RateLimiter {
    /// @ai:intent Wait until a slot is free in the rolling window
    /// @ai:effects state:write, time
    async fn acquire(&self) {
        loop {
            let sleep_duration = {
                let mut grants = self.grants.lock().await;
                let now = Instant::now();
                Self::prune(&mut grants, now, self.window);

                if grants.len() < self.capacity {
                    grants.push_back(now);
                    return;
                }

                match grants.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };

            tracing::trace!(wait_ms = sleep_duration.as_millis() as u64, "Rate limit reached");
            tokio::time::sleep(sleep_duration).await;
        }
    }
}

/// @ai:intent No-op limiter for unthrottled providers
#[derive(Debug, Clone, Copy, Default)]
pub struct Unthrottled;

impl RateLimiterTrait for Unthrottled {
    async fn acquire(&self) {}
}
