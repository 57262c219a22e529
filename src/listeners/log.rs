//! # LogListener: step notices as tracing records
//!
//! A minimal listener that forwards every notice to [`tracing`]. Attach it to the
//! steps whose progress should appear in the application log.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG stepvisor: step invocation finished step="await-build" invocation=3 rescheduling=true
//! WARN  stepvisor: step invocation failed step="await-build" invocation=4 error=connection refused
//! ```

use crate::error::StepError;
use crate::listeners::listener::{StepListener, StepNotice};

/// Listener writing notices through `tracing`.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogListener;

impl LogListener {
    /// Construct a new [`LogListener`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StepListener for LogListener {
    fn on_complete(&self, n: &StepNotice<'_>) {
        tracing::debug!(
            step = n.step,
            invocation = n.invocation,
            rescheduling = n.rescheduling,
            elapsed_ms = n.elapsed.as_millis() as u64,
            "step invocation finished"
        );
    }

    fn on_error(&self, n: &StepNotice<'_>, error: &StepError) {
        tracing::warn!(
            step = n.step,
            invocation = n.invocation,
            error = %error,
            "step invocation failed"
        );
    }

    fn name(&self) -> &'static str {
        "LogListener"
    }
}
