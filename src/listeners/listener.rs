//! # Listener contract
//!
//! `StepListener` is the extension point for observing step invocations. Both callbacks
//! default to no-ops so an implementation only overrides what it needs.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use stepvisor::{StepListener, StepNotice};
//!
//! #[derive(Default)]
//! struct PollCounter(AtomicU32);
//!
//! impl StepListener for PollCounter {
//!     fn on_complete(&self, _notice: &StepNotice<'_>) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!     fn name(&self) -> &'static str { "poll-counter" }
//! }
//! ```

use std::time::Duration;

use crate::error::StepError;

/// Details of one finished step invocation.
#[derive(Clone, Copy, Debug)]
pub struct StepNotice<'a> {
    /// Step name.
    pub step: &'a str,
    /// 1-based invocation number of this step instance.
    pub invocation: u32,
    /// Wall time spent inside `perform()`.
    pub elapsed: Duration,
    /// Whether the step asked to run again (always `false` on error).
    pub rescheduling: bool,
}

/// Observer of step invocations.
pub trait StepListener: Send + Sync + 'static {
    /// The invocation returned `Ok`.
    fn on_complete(&self, notice: &StepNotice<'_>) {
        let _ = notice;
    }

    /// The invocation failed.
    fn on_error(&self, notice: &StepNotice<'_>, error: &StepError) {
        let _ = (notice, error);
    }

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
