//! Exponential backoff for failing checks.

use std::time::Duration;

/// Maximum multiple of a check's base interval.
pub const MAX_BACKOFF_MULTIPLIER: u32 = 32;

/// Absolute ceiling on the wait between two executions of a check.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(60 * 60);

/// Per-check backoff state.
///
/// Owned by a single check loop and never shared: each reported outcome
/// consumes the current state and returns the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    consecutive_failures: u32,
    multiplier: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            multiplier: 1,
        }
    }
}

impl Backoff {
    /// State after a successful execution. Resets any failure streak.
    pub fn success(self) -> Self {
        Self::default()
    }

    /// State after a failed execution.
    ///
    /// The multiplier doubles per consecutive failure, clamped at
    /// [`MAX_BACKOFF_MULTIPLIER`].
    pub fn failure(self) -> Self {
        let consecutive_failures = self.consecutive_failures.saturating_add(1);
        let multiplier = 1u32
            .checked_shl(consecutive_failures)
            .unwrap_or(MAX_BACKOFF_MULTIPLIER)
            .min(MAX_BACKOFF_MULTIPLIER);
        Self {
            consecutive_failures,
            multiplier,
        }
    }

    /// Effective wait before the next execution for a check with the
    /// given base interval, capped at [`MAX_BACKOFF_DELAY`].
    pub fn delay(&self, base_interval: Duration) -> Duration {
        base_interval
            .saturating_mul(self.multiplier)
            .min(MAX_BACKOFF_DELAY)
    }

    /// Current multiplier applied to the base interval.
    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Current consecutive failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
