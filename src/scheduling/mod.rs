//! Scheduler backends: run a job now or after a delay.
//!
//! A [`Job`] is one boxed future that performs a single step invocation and reports
//! back to its processor. A [`Scheduler`] runs each accepted job exactly once unless it
//! is canceled through its [`ScheduledHandle`] before it starts.
//!
//! Backends:
//! - [`SameThreadScheduler`]: runs the job on the calling thread before returning
//!   (re-entrant calls are trampolined); delays are advisory.
//! - [`PooledScheduler`]: spawns onto a shared tokio runtime; the delay is a timer, so a
//!   waiting job occupies no worker thread.

mod handle;
mod pooled;
mod same_thread;
mod scheduler;

pub use handle::ScheduledHandle;
pub use pooled::PooledScheduler;
pub use same_thread::SameThreadScheduler;
pub use scheduler::{Job, Scheduler};
