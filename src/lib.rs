//! # stepvisor
//!
//! **Stepvisor** drives long-running, externally polled operations (a remote build, a
//! test run, an export job) as an ordered sequence of **steps**.
//!
//! Each step performs one round-trip of work and then says whether the *same* instance
//! must run again later. The engine reschedules it with a delay (the step's own hint or
//! the default backoff interval) or advances to the next step, until the sequence is
//! exhausted, the run is canceled, or a step fails.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!            ┌───────────────────────────────┐
//!            │  StepSequence (user-supplied) │
//!            │  StepList / SequenceFn / ...  │
//!            └───────────────┬───────────────┘
//!                            │ has_more() / next_step()
//!                            ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Processor<S: Scheduler>                                          │
//! │  - ProcessorConfig (name, DriveMode, BackoffPolicy, limits)       │
//! │  - run state (NotStarted → ... → Done | Failed | Canceled)        │
//! │  - cancellation flag + pending ScheduledHandle                    │
//! │  - FailureHandler (callback runs)                                 │
//! └──────┬───────────────────────────────────────────────────┬────────┘
//!        │ schedule(job) / schedule_after(job, delay)        │ publishes
//!        ▼                                                   ▼
//! ┌─────────────────────────────┐          ┌────────────────────────────┐
//! │ Scheduler                   │          │ Bus (broadcast, optional)  │
//! │ - SameThreadScheduler       │          │ RunStarted, StepStarting,  │
//! │ - PooledScheduler (tokio)   │          │ StepRescheduled, ...       │
//! └──────────────┬──────────────┘          └────────────────────────────┘
//!                │ runs job exactly once (unless canceled first)
//!                ▼
//!        ┌───────────────┐   per invocation   ┌──────────────────────────┐
//!        │ Step          │ ─────────────────► │ Observed<S> listeners    │
//!        │ perform()     │                    │ on_complete / on_error   │
//!        └───────────────┘                    └──────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Processor::run()
//!   ├─► Blocking: loop on the calling thread
//!   │     ├─► transition (first / reschedule / advance / done)
//!   │     ├─► wait out the delay (cancel wakes it)
//!   │     ├─► schedule the invocation, block until it reports back
//!   │     └─► Err(TaskError) straight to the caller
//!   │
//!   └─► Callback: schedule the first step, return a snapshot
//!         └─► each job: perform() → transition → schedule_after(next, delay)
//!               └─► errors go to the FailureHandler, run ends in Failed
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Steps**         | Units of work that may ask to run again.                      | [`Step`], [`StepFn`], [`StepStatus`]        |
//! | **Sequences**     | Ordered, lazily produced steps for one run.                   | [`StepSequence`], [`StepList`], [`SequenceFn`] |
//! | **Processing**    | Drive a sequence, blocking or callback-style.                 | [`Processor`], [`DriveMode`], [`RunReport`] |
//! | **Scheduling**    | Same-thread or tokio-pooled execution with delays.            | [`Scheduler`], [`PooledScheduler`]          |
//! | **Policies**      | Default reschedule interval with optional jitter.             | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Listeners**     | Per-step completion / error callbacks.                        | [`StepListener`], [`Observed`]              |
//! | **Events**        | Run lifecycle broadcast for progress trackers.                | [`Bus`], [`Event`], [`EventKind`]           |
//! | **Errors**        | Task-automation error family and scheduler errors.            | [`TaskError`], [`ScheduleError`]            |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use stepvisor::{
//!     PooledScheduler, Processor, RunState, StepError, StepFn, StepList, StepStatus,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let steps: StepList = vec![
//!         StepFn::boxed("trigger-build", |_| async { Ok::<_, StepError>(StepStatus::Complete) }),
//!         StepFn::boxed("await-build", |n| async move {
//!             // pretend the remote build reports success on the third poll
//!             Ok::<_, StepError>(if n < 3 { StepStatus::Again } else { StepStatus::Complete })
//!         }),
//!     ]
//!     .into_iter()
//!     .collect();
//!
//!     let processor = Processor::builder(steps)
//!         .name("nightly")
//!         .scheduler(PooledScheduler::current()?)
//!         .default_interval(Duration::from_millis(10))
//!         .build();
//!
//!     processor.run()?;
//!     let report = processor.wait().await;
//!     assert_eq!(report.state, RunState::Done);
//!     assert_eq!(report.performs, 4);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod listeners;
mod policies;
mod scheduling;
mod steps;

// ---- Public re-exports ----

pub use core::{
    CancelHandle, DriveMode, Failure, FailureHandler, LogFailure, Processor, ProcessorBuilder,
    ProcessorConfig, RunReport, RunState, StepOutcome, StepRecord,
};
pub use error::{ScheduleError, StepError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use listeners::{ListenerSet, LogListener, StepListener, StepNotice};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use scheduling::{Job, PooledScheduler, SameThreadScheduler, ScheduledHandle, Scheduler};
pub use steps::{
    BoxStep, Observed, SequenceFn, Step, StepExt, StepFn, StepList, StepSequence, StepStatus,
};
