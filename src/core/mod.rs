//! Engine core: the processor and everything it is configured with.
//!
//! The public API of this module is [`Processor`] (built with [`ProcessorBuilder`]),
//! its [`ProcessorConfig`], and what a run reports back ([`RunState`], [`RunReport`]).
//!
//! Internal modules:
//! - [`processor`]: transition rule, blocking and callback drivers, cancellation;
//! - [`builder`]: assembles sequence, scheduler, config, failure handler and bus;
//! - [`config`]: processor settings and drive mode;
//! - [`state`]: observable run states;
//! - [`report`]: run snapshots and per-step records;
//! - [`handler`]: failure routing for callback runs;
//! - [`signal`]: cancellation flag with a wake-up for blocking waits.

mod builder;
mod config;
mod handler;
mod processor;
mod report;
mod signal;
mod state;

pub use builder::ProcessorBuilder;
pub use config::{DriveMode, ProcessorConfig};
pub use handler::{FailureHandler, LogFailure};
pub use processor::{CancelHandle, Processor};
pub use report::{Failure, RunReport, StepOutcome, StepRecord};
pub use state::RunState;
