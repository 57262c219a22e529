//! # Scheduler contract
//!
//! ## Guarantees
//! - Exactly one execution of `job` per accepted call, unless canceled before start.
//! - `schedule_after(job, delay)` never starts `job` earlier than `delay` from the call
//!   (backends documented as delay-advisory excepted).
//! - A job that is dropped unexecuted (canceled, backend shut down) is simply dropped;
//!   jobs detect this through their own drop guards.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::ScheduleError;
use crate::scheduling::handle::ScheduledHandle;

/// One unit of scheduled work.
pub type Job = BoxFuture<'static, ()>;

/// Backend that arranges for jobs to run once.
pub trait Scheduler: Send + Sync + 'static {
    /// Runs `job` as soon as the backend allows.
    fn schedule(&self, job: Job) -> Result<ScheduledHandle, ScheduleError> {
        self.schedule_after(job, Duration::ZERO)
    }

    /// Runs `job` no earlier than `delay` from now.
    fn schedule_after(&self, job: Job, delay: Duration) -> Result<ScheduledHandle, ScheduleError>;

    /// Runs `job` for a caller that blocks until the job reports back.
    ///
    /// Backends executing on the caller's thread must finish `job` before returning,
    /// even when called from inside one of their own jobs.
    fn schedule_blocking(&self, job: Job) -> Result<ScheduledHandle, ScheduleError> {
        self.schedule(job)
    }

    /// Human-readable backend name (for logs and errors).
    fn name(&self) -> &'static str;
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule(&self, job: Job) -> Result<ScheduledHandle, ScheduleError> {
        (**self).schedule(job)
    }

    fn schedule_after(&self, job: Job, delay: Duration) -> Result<ScheduledHandle, ScheduleError> {
        (**self).schedule_after(job, delay)
    }

    fn schedule_blocking(&self, job: Job) -> Result<ScheduledHandle, ScheduleError> {
        (**self).schedule_blocking(job)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
