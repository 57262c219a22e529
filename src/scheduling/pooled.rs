//! # Pooled scheduler on a shared tokio runtime.
//!
//! Each accepted job becomes one tokio task that first waits out its delay on the
//! runtime timer (cancellable), then claims its handle and runs. The runtime belongs to
//! the host application; the scheduler only holds a [`Handle`] to it, and clones of one
//! `PooledScheduler` share the admission limit and the shutdown switch.
//!
//! ## Flow
//! ```text
//! schedule_after(job, delay)
//!   ├─► closed?            → Err(Closed)
//!   ├─► permit available?  → Err(Rejected) when the limit is reached
//!   └─► spawn ─► select! { handle canceled → drop job
//!                          shutdown       → drop job
//!                          sleep(delay)   → try_start → job.await → finish }
//! ```
//!
//! ## Sentinel values
//! - `max_outstanding = 0` → unlimited (no semaphore created)

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::ScheduleError;
use crate::scheduling::handle::ScheduledHandle;
use crate::scheduling::scheduler::{Job, Scheduler};

const NAME: &str = "pooled";

/// Timer-backed scheduler running jobs on a tokio runtime.
#[derive(Clone, Debug)]
pub struct PooledScheduler {
    runtime: Handle,
    permits: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
}

impl PooledScheduler {
    /// Creates a scheduler spawning onto `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            permits: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Creates a scheduler on the runtime the caller is running in.
    pub fn current() -> Result<Self, ScheduleError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| ScheduleError::NoRuntime)
    }

    /// Limits the number of outstanding (waiting or running) jobs; `0` = unlimited.
    #[must_use]
    pub fn with_limit(mut self, max_outstanding: usize) -> Self {
        self.permits = (max_outstanding > 0).then(|| Arc::new(Semaphore::new(max_outstanding)));
        self
    }

    /// Stops accepting jobs and drops every job still waiting for its delay.
    ///
    /// Jobs already running are not interrupted.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(permits) = &self.permits {
            permits.close();
        }
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn admit(&self) -> Result<Option<OwnedSemaphorePermit>, ScheduleError> {
        let Some(permits) = &self.permits else {
            return Ok(None);
        };
        match Arc::clone(permits).try_acquire_owned() {
            Ok(permit) => Ok(Some(permit)),
            Err(TryAcquireError::NoPermits) => Err(ScheduleError::Rejected {
                scheduler: NAME,
                reason: "outstanding job limit reached".to_string(),
            }),
            Err(TryAcquireError::Closed) => Err(ScheduleError::Closed { scheduler: NAME }),
        }
    }
}

impl Scheduler for PooledScheduler {
    fn schedule_after(&self, job: Job, delay: Duration) -> Result<ScheduledHandle, ScheduleError> {
        if self.is_closed() {
            return Err(ScheduleError::Closed { scheduler: NAME });
        }
        let permit = self.admit()?;

        let handle = ScheduledHandle::new();
        let task_handle = handle.clone();
        let shutdown = self.shutdown.clone();

        self.runtime.spawn(async move {
            let _permit = permit;
            let sleep = time::sleep(delay);
            tokio::pin!(sleep);

            select! {
                biased;
                _ = task_handle.token().cancelled() => return,
                _ = shutdown.cancelled() => return,
                _ = &mut sleep => {}
            }

            if !task_handle.try_start() {
                return;
            }
            job.await;
            task_handle.finish();
        });
        Ok(handle)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
