//! # Closure-backed step (`StepFn`)
//!
//! [`StepFn`] wraps a closure `F: FnMut(u32) -> Fut` that performs one invocation and
//! reports a [`StepStatus`]. The closure receives the 1-based invocation number of the
//! current instance, so simple polling steps need no struct of their own.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use stepvisor::{BoxStep, Step, StepError, StepFn, StepStatus};
//!
//! let poll: BoxStep = StepFn::boxed("poll-build", |invocation| async move {
//!     if invocation < 3 {
//!         Ok::<_, StepError>(StepStatus::AgainAfter(Duration::from_secs(5)))
//!     } else {
//!         Ok(StepStatus::Complete)
//!     }
//! });
//! assert_eq!(poll.name(), "poll-build");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StepError;
use crate::steps::step::{BoxStep, Step};

/// Outcome of one [`StepFn`] invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// The stage is finished; advance the sequence.
    Complete,
    /// Run this step again after the processor's default interval.
    Again,
    /// Run this step again after the given interval.
    AgainAfter(Duration),
}

/// Closure-backed step.
pub struct StepFn<F> {
    name: Cow<'static, str>,
    f: F,
    invocations: u32,
    last: Option<StepStatus>,
}

impl<F> StepFn<F> {
    /// Creates a new closure-backed step.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            invocations: 0,
            last: None,
        }
    }

    /// Number of invocations since creation or the last [`reset`](Step::reset).
    pub fn invocations(&self) -> u32 {
        self.invocations
    }

    /// Status reported by the last successful invocation.
    pub fn last_status(&self) -> Option<StepStatus> {
        self.last
    }
}

impl<F, Fut> StepFn<F>
where
    F: FnMut(u32) -> Fut + Send + 'static,
    Fut: Future<Output = Result<StepStatus, StepError>> + Send + 'static,
{
    /// Creates the step and returns it boxed, ready for a sequence.
    pub fn boxed(name: impl Into<Cow<'static, str>>, f: F) -> BoxStep {
        Box::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Step for StepFn<F>
where
    F: FnMut(u32) -> Fut + Send + 'static,
    Fut: Future<Output = Result<StepStatus, StepError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        self.invocations += 1;
        self.last = None;
        let fut = (self.f)(self.invocations);
        self.last = Some(fut.await?);
        Ok(())
    }

    fn needs_rescheduling(&self) -> bool {
        matches!(
            self.last,
            Some(StepStatus::Again | StepStatus::AgainAfter(_))
        )
    }

    fn suggested_interval(&self) -> Option<Duration> {
        match self.last {
            Some(StepStatus::AgainAfter(d)) => Some(d),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.invocations = 0;
        self.last = None;
    }
}
