//! # Jitter for reschedule intervals.
//!
//! A fleet of processors polling one CI server with the same default interval ends up
//! querying it in lockstep: every build watcher wakes on the same tick. [`JitterPolicy`]
//! spreads those status polls apart. It only touches the default interval computed by
//! [`BackoffPolicy`](crate::BackoffPolicy); a step's own suggested interval is used as is.
//!
//! | Policy         | Next poll after                                   |
//! |----------------|---------------------------------------------------|
//! | `None`         | the interval                                      |
//! | `Full`         | random in `[0, interval]`                         |
//! | `Equal`        | `interval/2 + random[0, interval/2]`              |
//! | `Decorrelated` | random in `[first, interval × 3]`, capped at max  |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use stepvisor::JitterPolicy;
//!
//! // ten watchers of the same build, each due for a status poll in 2s
//! let polls: Vec<Duration> = (0..10)
//!     .map(|_| JitterPolicy::Equal.apply(Duration::from_secs(2)))
//!     .collect();
//! assert!(polls.iter().all(|d| *d >= Duration::from_secs(1) && *d <= Duration::from_secs(2)));
//! ```

use rand::Rng;
use std::time::Duration;

/// Randomization applied to the default interval before a step is polled again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Poll exactly on the interval. Fine for a single watcher and for tests.
    #[default]
    None,
    /// Uniform in `[0, interval]`.
    Full,
    /// Half fixed, half random.
    Equal,
    /// Spread up to three times the interval; needs the floor and cap, see
    /// [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Jitters the delay before the next poll.
    ///
    /// `Decorrelated` returns `delay` unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => Self::full(delay),
            JitterPolicy::Equal => Self::equal(delay),
        }
    }

    /// Next poll delay uniform in `[floor, min(prev × 3, max)]`.
    ///
    /// [`BackoffPolicy`](crate::BackoffPolicy) passes the un-jittered interval as `prev`.
    ///
    /// Other policies fall back to [`apply`](Self::apply) on `prev`.
    pub fn apply_decorrelated(&self, floor: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }

        let floor_ms = floor.as_millis() as u64;
        let upper = (prev.as_millis() as u64)
            .saturating_mul(3)
            .min(max.as_millis() as u64)
            .max(floor_ms);

        if floor_ms >= upper {
            return floor;
        }
        Duration::from_millis(rand::rng().random_range(floor_ms..=upper))
    }

    fn full(delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ms))
    }

    fn equal(delay: Duration) -> Duration {
        let half = delay.as_millis() as u64 / 2;
        if half == 0 {
            return delay;
        }
        Duration::from_millis(half + rand::rng().random_range(0..=half))
    }
}
