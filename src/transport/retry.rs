//! Bounded exponential backoff for transient network faults.

use std::time::Duration;

/// Retry policy applied to every transport call.
///
/// The delay before retry `n` (1-based) is `min(cap, base * 2^(n-1))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never sleeps between attempts. Used in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Whether a request error is worth retrying.
///
/// Timeouts, refused or reset connections and truncated bodies are
/// transient. Anything the server actually answered is not. A body cut
/// short surfaces from `text()` as a decode error, so both count.
pub fn is_transient(err: &reqwest::Error) -> bool {
    if err.status().is_some() {
        return false;
    }
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_decode() || err.is_request()
}
