//! # Run lifecycle events.
//!
//! The [`EventKind`] enum classifies what happened to a run:
//! - **Run events**: started, completed, canceled, failed
//! - **Step events**: starting, completed, rescheduled, failed
//!
//! The [`Event`] struct carries the processor name, step name, invocation number,
//! reschedule delay and failure reason where they apply.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Within one processor, events are published in transition order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use stepvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::StepRescheduled)
//!     .with_processor("nightly-build")
//!     .with_step("await-build")
//!     .with_invocation(2)
//!     .with_delay(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::StepRescheduled);
//! assert_eq!(ev.step.as_deref(), Some("await-build"));
//! assert_eq!(ev.delay_ms, Some(5_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of run events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Run events ===
    /// The first step was fetched and the run began.
    ///
    /// Sets: `processor`
    RunStarted,

    /// The sequence was exhausted; every step completed.
    ///
    /// Sets: `processor`, `invocation` (total `perform()` calls)
    RunCompleted,

    /// The run was canceled.
    ///
    /// Sets: `processor`
    RunCanceled,

    /// The run terminated on a failure.
    ///
    /// Sets: `processor`, `step` (when known), `reason`
    RunFailed,

    // === Step events ===
    /// A step invocation is about to call `perform()`.
    ///
    /// Sets: `processor`, `step`, `invocation`
    StepStarting,

    /// A step returned `Ok` and does not need to run again.
    ///
    /// Sets: `processor`, `step`, `invocation`
    StepCompleted,

    /// A step returned `Ok` and will run again after `delay_ms`.
    ///
    /// Sets: `processor`, `step`, `invocation`, `delay_ms`
    StepRescheduled,

    /// A step invocation failed.
    ///
    /// Sets: `processor`, `step`, `invocation`, `reason`
    StepFailed,
}

/// Run event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the publishing processor.
    pub processor: Option<Arc<str>>,
    /// Name of the step, if applicable.
    pub step: Option<Arc<str>>,
    /// Invocation number of the step (starting from 1), or a total for run events.
    pub invocation: Option<u32>,
    /// Reschedule delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            processor: None,
            step: None,
            invocation: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches the processor name.
    #[inline]
    pub fn with_processor(mut self, name: impl Into<Arc<str>>) -> Self {
        self.processor = Some(name.into());
        self
    }

    /// Attaches a step name.
    #[inline]
    pub fn with_step(mut self, step: impl Into<Arc<str>>) -> Self {
        self.step = Some(step.into());
        self
    }

    /// Attaches an invocation number.
    #[inline]
    pub fn with_invocation(mut self, n: u32) -> Self {
        self.invocation = Some(n);
        self
    }

    /// Attaches a reschedule delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether this event ends a run.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::RunCompleted | EventKind::RunCanceled | EventKind::RunFailed
        )
    }
}
