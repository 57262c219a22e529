//! # Listener registration per step instance.
//!
//! [`Observed`] wraps a step and reports each of its invocations to a
//! [`ListenerSet`]. The processor sees an ordinary [`Step`]; nothing in the driving
//! loop knows listeners exist.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use stepvisor::{BoxStep, LogListener, StepError, StepExt, StepFn, StepStatus};
//!
//! let audited: BoxStep = StepFn::new("deploy", |_: u32| async { Ok::<_, StepError>(StepStatus::Complete) })
//!     .observe(Arc::new(LogListener::new()))
//!     .boxed();
//! ```

use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::{StepError, TaskError, panic_message};
use crate::listeners::{ListenerSet, StepListener, StepNotice};
use crate::steps::step::{BoxStep, Step};

/// Step wrapper that notifies listeners after every invocation.
pub struct Observed<S> {
    inner: S,
    listeners: ListenerSet,
    invocation: u32,
}

impl<S: Step> Observed<S> {
    /// Wraps `inner` with an empty listener set.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            listeners: ListenerSet::new(),
            invocation: 0,
        }
    }

    /// Registers one more listener on this step instance.
    #[must_use]
    pub fn observe(mut self, listener: Arc<dyn StepListener>) -> Self {
        self.listeners.add(listener);
        self
    }

    /// Borrow the wrapped step.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Listeners registered on this instance.
    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }
}

#[async_trait]
impl<S: Step> Step for Observed<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn perform(&mut self) -> Result<(), StepError> {
        self.invocation += 1;
        let started = Instant::now();
        let caught = AssertUnwindSafe(self.inner.perform()).catch_unwind().await;
        let res = match caught {
            Ok(res) => res,
            Err(payload) => {
                let err: StepError = Box::new(TaskError::Panicked {
                    step: self.inner.name().to_string(),
                    info: panic_message(payload.as_ref()),
                });
                let notice = StepNotice {
                    step: self.inner.name(),
                    invocation: self.invocation,
                    elapsed: started.elapsed(),
                    rescheduling: false,
                };
                self.listeners.notify_error(&notice, &err);
                resume_unwind(payload);
            }
        };
        let notice = StepNotice {
            step: self.inner.name(),
            invocation: self.invocation,
            elapsed: started.elapsed(),
            rescheduling: res.is_ok() && self.inner.needs_rescheduling(),
        };
        match &res {
            Ok(()) => self.listeners.notify_complete(&notice),
            Err(e) => self.listeners.notify_error(&notice, e),
        }
        res
    }

    fn needs_rescheduling(&self) -> bool {
        self.inner.needs_rescheduling()
    }

    fn suggested_interval(&self) -> Option<Duration> {
        self.inner.suggested_interval()
    }

    fn reset(&mut self) {
        self.invocation = 0;
        self.inner.reset();
    }
}

/// Convenience adapters available on every [`Step`].
pub trait StepExt: Step + Sized {
    /// Wraps the step and registers `listener` on it.
    fn observe(self, listener: Arc<dyn StepListener>) -> Observed<Self> {
        Observed::new(self).observe(listener)
    }

    /// Boxes the step for use in a sequence.
    fn boxed(self) -> BoxStep {
        Box::new(self)
    }
}

impl<S: Step> StepExt for S {}
