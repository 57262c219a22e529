//! Reschedule delay policies.
//!
//! A step that needs rescheduling may suggest its own delay. When it does not, the
//! processor asks its [`BackoffPolicy`] for the default interval of that reschedule.
//!
//! ## Contents
//! - [`BackoffPolicy`] how the default interval evolves (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to keep many processors from polling in lockstep
//!
//! ## Quick wiring
//! ```text
//! ProcessorConfig { backoff: BackoffPolicy, .. }
//!      └─► Processor::transition uses:
//!           - step.suggested_interval()        if the step has an opinion
//!           - backoff.interval(reschedule_n)   otherwise
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.
//! - `JitterPolicy::None` by default; consider `Equal` when many runs poll the same backend.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
