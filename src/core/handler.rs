//! # Failure handling for callback-driven runs.
//!
//! A callback run has no caller to return an error to, so the processor hands the
//! classified error to its [`FailureHandler`] and terminates the run in `Failed`.
//! The default handler, [`LogFailure`], writes the error through `tracing` and halts.

use crate::error::TaskError;

/// Receives the error that terminated a callback-driven run.
///
/// Called once per run, from whichever thread performed the failing transition, after
/// the run reached `Failed`.
pub trait FailureHandler: Send + Sync + 'static {
    /// Handles the terminal error of processor `processor`.
    fn on_failure(&self, processor: &str, error: &TaskError);
}

impl<F> FailureHandler for F
where
    F: Fn(&str, &TaskError) + Send + Sync + 'static,
{
    fn on_failure(&self, processor: &str, error: &TaskError) {
        self(processor, error)
    }
}

/// Default handler: logs the error at `error` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFailure;

impl FailureHandler for LogFailure {
    fn on_failure(&self, processor: &str, error: &TaskError) {
        tracing::error!(
            processor,
            label = error.as_label(),
            error = %error,
            "run failed"
        );
    }
}
