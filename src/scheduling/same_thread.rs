//! # Same-thread scheduler.
//!
//! Runs each job on the calling thread, to completion, before `schedule` returns.
//!
//! ## Re-entrancy
//! A job may schedule the next job (that is how callback-driven processors continue).
//! Nested calls are not executed recursively: they are queued on a per-thread
//! trampoline and run, in order, as soon as the job that scheduled them returns, still
//! inside the outermost `schedule` call.
//!
//! ```text
//! schedule(job1)                 ◄── outermost call drains the queue
//!   ├─► job1 ──► schedule(job2)  ◄── queued, returns a pending handle
//!   ├─► job2 ──► schedule(job3)  ◄── queued
//!   └─► job3
//! ```
//!
//! [`Scheduler::schedule_blocking`] skips the trampoline: the job runs before the call
//! returns even inside another job, so a blocking-mode run nested in a same-thread job
//! can wait on its own invocations.
//!
//! ## Rules
//! - Delays are advisory and ignored; callers that need a real wait do it themselves.
//! - Jobs are polled on the calling thread, which parks while they are pending, so they
//!   must not rely on a tokio reactor unless the caller entered one.
//! - Never call `schedule` from inside an async runtime worker: it blocks the thread.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Context;
use std::thread::{self, Thread};
use std::time::Duration;

use futures::task::{ArcWake, waker_ref};

use crate::error::ScheduleError;
use crate::scheduling::handle::ScheduledHandle;
use crate::scheduling::scheduler::{Job, Scheduler};

type Queue = VecDeque<(Job, ScheduledHandle)>;

thread_local! {
    static TRAMPOLINE: RefCell<Option<Queue>> = const { RefCell::new(None) };
}

/// Scheduler executing jobs synchronously on the caller's thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct SameThreadScheduler;

impl SameThreadScheduler {
    /// Creates the scheduler.
    pub fn new() -> Self {
        Self
    }

    fn execute(job: Job, handle: &ScheduledHandle) {
        if handle.try_start() {
            run_to_completion(job);
            handle.finish();
        }
    }

    fn drain() {
        loop {
            let next = TRAMPOLINE.with(|t| t.borrow_mut().as_mut().and_then(VecDeque::pop_front));
            match next {
                Some((job, handle)) => Self::execute(job, &handle),
                None => break,
            }
        }
    }
}

/// Wakes the parked thread that is polling one job.
struct Unparker {
    thread: Thread,
    woken: AtomicBool,
}

impl ArcWake for Unparker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::Release);
        arc_self.thread.unpark();
    }
}

/// Polls `job` on this thread until it completes.
///
/// Each call owns its wake flag, so calls may nest inside a job that is itself being
/// polled here (unlike `futures::executor::block_on`, which refuses to nest).
fn run_to_completion(mut job: Job) {
    let unparker = Arc::new(Unparker {
        thread: thread::current(),
        woken: AtomicBool::new(false),
    });
    let waker = waker_ref(&unparker);
    let mut cx = Context::from_waker(&waker);
    while job.as_mut().poll(&mut cx).is_pending() {
        while !unparker.woken.swap(false, Ordering::Acquire) {
            thread::park();
        }
    }
}

/// Clears the trampoline when the outermost call returns or unwinds.
struct Draining;

impl Drop for Draining {
    fn drop(&mut self) {
        let leftover = TRAMPOLINE.with(|t| t.borrow_mut().take());
        drop(leftover);
    }
}

impl Scheduler for SameThreadScheduler {
    fn schedule_after(&self, job: Job, delay: Duration) -> Result<ScheduledHandle, ScheduleError> {
        if !delay.is_zero() {
            tracing::trace!(?delay, "same-thread scheduler runs delayed job immediately");
        }
        let handle = ScheduledHandle::new();

        let outermost = TRAMPOLINE.with(|t| {
            let mut slot = t.borrow_mut();
            match slot.as_mut() {
                Some(queue) => {
                    queue.push_back((job, handle.clone()));
                    None
                }
                None => {
                    *slot = Some(VecDeque::new());
                    Some(job)
                }
            }
        });

        if let Some(job) = outermost {
            let _draining = Draining;
            Self::execute(job, &handle);
            Self::drain();
        }
        Ok(handle)
    }

    fn schedule_blocking(&self, job: Job) -> Result<ScheduledHandle, ScheduleError> {
        let handle = ScheduledHandle::new();
        Self::execute(job, &handle);
        Ok(handle)
    }

    fn name(&self) -> &'static str {
        "same-thread"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn record(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Job {
        let log = Arc::clone(log);
        Box::pin(async move { log.lock().unwrap().push(label) })
    }

    #[test]
    fn runs_before_returning() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let h = SameThreadScheduler
            .schedule_after(record(&log, "a"), Duration::from_secs(60))
            .unwrap();
        assert!(h.is_finished());
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn nested_jobs_run_after_their_parent_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_log = Arc::clone(&log);
        let parent: Job = Box::pin(async move {
            SameThreadScheduler.schedule(record(&inner_log, "child-1")).unwrap();
            SameThreadScheduler.schedule(record(&inner_log, "child-2")).unwrap();
            inner_log.lock().unwrap().push("parent-end");
        });

        SameThreadScheduler.schedule(parent).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["parent-end", "child-1", "child-2"]
        );
    }

    #[test]
    fn queued_job_can_be_canceled_before_it_runs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_log = Arc::clone(&log);
        let parent: Job = Box::pin(async move {
            let h = SameThreadScheduler.schedule(record(&inner_log, "child")).unwrap();
            assert!(h.cancel());
        });

        SameThreadScheduler.schedule(parent).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn long_chains_do_not_grow_the_stack() {
        fn chain(left: u32, count: Arc<Mutex<u32>>) -> Job {
            Box::pin(async move {
                *count.lock().unwrap() += 1;
                if left > 0 {
                    SameThreadScheduler.schedule(chain(left - 1, count)).unwrap();
                }
            })
        }
        let count = Arc::new(Mutex::new(0));
        SameThreadScheduler.schedule(chain(50_000, Arc::clone(&count))).unwrap();
        assert_eq!(*count.lock().unwrap(), 50_001);
    }

    #[test]
    fn blocking_submission_runs_inside_a_job() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_log = Arc::clone(&log);
        let parent: Job = Box::pin(async move {
            let h = SameThreadScheduler
                .schedule_blocking(record(&inner_log, "child"))
                .unwrap();
            assert!(h.is_finished());
            inner_log.lock().unwrap().push("parent-end");
        });

        SameThreadScheduler.schedule(parent).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["child", "parent-end"]);
    }

    #[test]
    fn pending_job_is_resumed_when_woken_from_another_thread() {
        let (tx, rx) = futures::channel::oneshot::channel::<u32>();
        let got = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&got);
        let job: Job = Box::pin(async move {
            *sink.lock().unwrap() = rx.await.ok();
        });
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            let _ = tx.send(7);
        });

        SameThreadScheduler.schedule(job).unwrap();
        sender.join().unwrap();
        assert_eq!(*got.lock().unwrap(), Some(7));
    }
}
