//! # Processor configuration.
//!
//! Provides [`ProcessorConfig`], the settings one [`Processor`](crate::Processor) runs with,
//! and [`DriveMode`], the choice between a blocking and a callback driver.
//!
//! ## Sentinel values
//! - `max_reschedules = 0` → unlimited (a step may ask to run again forever)
//! - `bus_capacity = 0` → clamped to 1 when a bus is created from the config

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// How a processor drives its sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriveMode {
    /// `run()` drives every step on the calling thread and returns the final report.
    Blocking,
    /// `run()` schedules the first step and returns; each completed job schedules the next.
    #[default]
    Callback,
}

/// Configuration of one processor.
///
/// ## Field semantics
/// - `name`: used in logs, events and errors
/// - `mode`: blocking or callback driving (default `Callback`)
/// - `backoff`: default reschedule interval when a step suggests none
/// - `max_reschedules`: reschedules allowed per step (`0` = unlimited)
/// - `bus_capacity`: ring buffer size of a bus created by the builder (min 1)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over sprinkling sentinel checks.
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// Processor name.
    pub name: String,

    /// Drive mode.
    pub mode: DriveMode,

    /// Default reschedule interval policy.
    ///
    /// `backoff.first` is the default backoff interval; with `factor = 1.0` every
    /// reschedule waits exactly that long.
    pub backoff: BackoffPolicy,

    /// Maximum number of reschedules per step.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = the `n + 1`-th request fails the run with `RescheduleLimit`
    pub max_reschedules: u32,

    /// Capacity of the event bus created by [`ProcessorBuilder::publish_events`](crate::ProcessorBuilder::publish_events).
    pub bus_capacity: usize,
}

impl ProcessorConfig {
    /// Creates the default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the reschedule limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` reschedules per step
    #[inline]
    pub fn reschedule_limit(&self) -> Option<u32> {
        if self.max_reschedules == 0 {
            None
        } else {
            Some(self.max_reschedules)
        }
    }

    /// The default backoff interval (delay of the first reschedule of a step).
    #[inline]
    pub fn default_interval(&self) -> Duration {
        self.backoff.first
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ProcessorConfig {
    /// Default configuration:
    ///
    /// - `name = "processor"`
    /// - `mode = DriveMode::Callback`
    /// - `backoff = BackoffPolicy::default()` (constant 100ms)
    /// - `max_reschedules = 0` (unlimited)
    /// - `bus_capacity = 256`
    fn default() -> Self {
        Self {
            name: "processor".to_string(),
            mode: DriveMode::default(),
            backoff: BackoffPolicy::default(),
            max_reschedules: 0,
            bus_capacity: 256,
        }
    }
}
