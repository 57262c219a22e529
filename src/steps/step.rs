//! # Step: one stage of an externally polled task.
//!
//! A [`Step`] performs one round-trip of work (typically "ask the remote system whether
//! the job is done yet") and then tells the processor whether the **same** instance
//! must run again. State the step needs across re-invocations (attempt counters, a
//! remote job id) lives in the step itself.
//!
//! ## Contract
//! - `perform()` is never called concurrently for one instance.
//! - `needs_rescheduling()` is asked right after `perform()` returned `Ok`, and must
//!   answer from state recorded during that call.
//! - A failing `perform()` ends the run; it is never read as "needs rescheduling".

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StepError;

/// Boxed step, as produced by a [`StepSequence`](crate::StepSequence).
pub type BoxStep = Box<dyn Step>;

/// # One retriable unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use stepvisor::{Step, StepError};
///
/// /// Polls until the remote build has reported three times.
/// struct AwaitBuild {
///     polls: u32,
/// }
///
/// #[async_trait]
/// impl Step for AwaitBuild {
///     fn name(&self) -> &str { "await-build" }
///
///     async fn perform(&mut self) -> Result<(), StepError> {
///         self.polls += 1;
///         Ok(())
///     }
///
///     fn needs_rescheduling(&self) -> bool {
///         self.polls < 3
///     }
/// }
/// ```
#[async_trait]
pub trait Step: Send + 'static {
    /// Returns a stable, human-readable step name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Executes one invocation of the step.
    async fn perform(&mut self) -> Result<(), StepError>;

    /// Whether this same instance must run again instead of advancing the sequence.
    fn needs_rescheduling(&self) -> bool;

    /// Preferred delay before the next invocation.
    ///
    /// `None` (or a zero duration) defers to the processor's backoff policy.
    fn suggested_interval(&self) -> Option<Duration> {
        None
    }

    /// Returns the step to a state suitable for reuse.
    fn reset(&mut self) {}
}

#[async_trait]
impl<S: Step + ?Sized> Step for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        (**self).perform().await
    }

    fn needs_rescheduling(&self) -> bool {
        (**self).needs_rescheduling()
    }

    fn suggested_interval(&self) -> Option<Duration> {
        (**self).suggested_interval()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
