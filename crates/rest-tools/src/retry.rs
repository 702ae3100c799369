use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for outbound REST calls (Temporal-style fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the initial attempt (1 => no retries).
    pub maximum_attempts: u32,
    /// Initial backoff interval in milliseconds (before the first retry).
    pub initial_interval_ms: u64,
    /// Backoff multiplier (typically >= 1.0).
    pub backoff_coefficient: f64,
    /// Optional maximum interval between retries in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_interval_ms: Option<u64>,
    /// HTTP statuses that are treated as transient and retried with the same backoff.
    ///
    /// Any other non-2xx status is a deterministic rejection and surfaces immediately.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            maximum_attempts: 3,
            initial_interval_ms: 200,
            backoff_coefficient: 2.0,
            maximum_interval_ms: Some(5_000),
            retryable_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            maximum_attempts: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.maximum_attempts.max(1)
    }

    /// Backoff before the attempt following `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        // attempt starts at 1 for the initial try; delay after attempt 1 is `initial_interval`.
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(30);
        let coeff = self.backoff_coefficient;
        if !coeff.is_finite() || coeff <= 0.0 {
            return Duration::ZERO;
        }
        let mult = coeff.powi(i32::try_from(exp).unwrap_or(30));
        if !mult.is_finite() || mult <= 0.0 {
            return Duration::ZERO;
        }

        let d = Duration::from_millis(self.initial_interval_ms).mul_f64(mult);
        self.cap(d)
    }

    /// Backoff honoring a server-provided `Retry-After` hint, still bounded by the policy cap.
    #[must_use]
    pub fn delay_with_hint(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = self.delay_after(attempt);
        match retry_after {
            Some(hint) if hint > base => self.cap(hint),
            _ => base,
        }
    }

    fn cap(&self, d: Duration) -> Duration {
        match self.maximum_interval_ms {
            Some(max_ms) => d.min(Duration::from_millis(max_ms)),
            None => d,
        }
    }
}
