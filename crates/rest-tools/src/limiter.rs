//! Admission control for outbound REST calls.
//!
//! Two constraints are enforced for every call made through one gateway:
//! - at most `max_concurrent` calls in flight
//! - consecutive call starts spaced by at least `min_interval`
//!
//! A caller that cannot be admitted waits; it is never rejected.

use crate::config::RateLimitConfig;
use crate::error::{RestError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    max_concurrent: usize,
    min_interval: Duration,
    permits: Arc<Semaphore>,
    /// Earliest instant the next call may start.
    next_start: Mutex<Instant>,
}

/// Proof of admission. The concurrency slot is released when this is dropped.
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(RateLimiterInner {
                max_concurrent,
                min_interval,
                permits: Arc::new(Semaphore::new(max_concurrent)),
                next_start: Mutex::new(Instant::now()),
            }),
        }
    }

    #[must_use]
    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(cfg.max_concurrent, cfg.min_interval())
    }

    /// Wait until a call may start.
    ///
    /// # Errors
    ///
    /// Only fails if the limiter has been shut down, which never happens for a live gateway.
    pub async fn acquire(&self) -> Result<Admission> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| RestError::Transport("rate limiter closed".to_string()))?;

        if !self.inner.min_interval.is_zero() {
            let start_at = self.reserve_start_slot();
            tokio::time::sleep_until(start_at).await;
        }

        Ok(Admission { _permit: permit })
    }

    /// Claim the next start slot and push the following one back by `min_interval`.
    fn reserve_start_slot(&self) -> Instant {
        let now = Instant::now();
        let mut next = self.inner.next_start.lock();
        let start_at = (*next).max(now);
        *next = start_at + self.inner.min_interval;
        start_at
    }

    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Number of calls currently holding an admission.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.max_concurrent - self.inner.permits.available_permits()
    }
}
