//! # Default reschedule interval.
//!
//! [`BackoffPolicy`] yields the delay a processor waits before re-invoking a step that
//! asked to be rescheduled without suggesting an interval of its own.
//!
//! The interval for the `n`-th reschedule of one step (0-indexed) is `first × factor^n`,
//! clamped to `max`, then jittered. The base depends only on `n`, so jitter never
//! compounds across reschedules. The counter is per step: advancing to a new step
//! starts again from `first`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use stepvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(4),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.interval(0), Duration::from_millis(250));
//! assert_eq!(backoff.interval(2), Duration::from_secs(1));
//! assert_eq!(backoff.interval(9), Duration::from_secs(4));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Default reschedule interval policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Interval before the first reschedule of a step.
    pub first: Duration,
    /// Upper bound for any interval.
    pub max: Duration,
    /// Multiplicative growth per reschedule (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied to the clamped interval.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 100ms polling interval, capped at 30s, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_millis(100))
    }
}

impl BackoffPolicy {
    /// Policy that always yields `interval` (the plain "default backoff interval").
    pub fn constant(interval: Duration) -> Self {
        Self {
            first: interval,
            max: interval.max(Duration::from_secs(30)),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Interval before the `reschedule`-th (0-indexed) re-invocation of one step.
    ///
    /// # Notes
    /// - `factor < 1.0` shrinks the interval on every reschedule (rarely useful).
    /// - Non-finite or negative intermediate values collapse to `max`.
    pub fn interval(&self, reschedule: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = reschedule.min(i32::MAX as u32) as i32;
        let raw_secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !raw_secs.is_finite() || raw_secs < 0.0 || raw_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(raw_secs)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}
