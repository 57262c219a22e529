//! # Step abstractions and sequences.
//!
//! This module provides the step-related types:
//! - [`Step`] - trait for one retriable unit of work
//! - [`StepFn`] / [`StepStatus`] - closure-backed step implementation
//! - [`StepSequence`] - ordered, lazily produced source of steps for one run
//! - [`StepList`] / [`SequenceFn`] - eager and lazy sequence implementations
//! - [`Observed`] / [`StepExt`] - per-step listener registration

mod observed;
mod sequence;
mod step;
mod step_fn;

pub use observed::{Observed, StepExt};
pub use sequence::{SequenceFn, StepList, StepSequence};
pub use step::{BoxStep, Step};
pub use step_fn::{StepFn, StepStatus};
