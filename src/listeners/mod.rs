//! # Per-step listeners.
//!
//! A [`StepListener`] observes individual step invocations. It is attached to a step
//! instance (see [`Observed`](crate::Observed)), not to the processor, so audit or
//! progress trackers can follow exactly the stages they care about.
//!
//! ## Architecture
//! ```text
//! Processor ── perform() ──► Observed<S>
//!                               ├─► S::perform()
//!                               └─► ListenerSet
//!                                     ├─► listener1.on_complete() | on_error()
//!                                     ├─► listener2 ...
//!                                     └─► panic → logged, next listener still runs
//! ```
//!
//! ## Rules
//! - Each invocation yields exactly one signal per listener: completion **or** error.
//! - Listeners run synchronously on the thread that performed the step; keep them cheap.
//! - A panicking listener never fails the step nor skips other listeners.

mod listener;
mod log;
mod set;

pub use listener::{StepListener, StepNotice};
pub use log::LogListener;
pub use set::ListenerSet;
