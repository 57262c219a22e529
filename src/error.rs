//! Error types used by the stepvisor engine and by steps.
//!
//! This module defines two main error enums:
//!
//! - [`TaskError`]: the task-automation error family surfaced to callers.
//! - [`ScheduleError`]: failures of a scheduler backend to arrange execution.
//!
//! Steps fail with a [`StepError`] (any boxed error). Before it reaches a caller or a
//! [`FailureHandler`](crate::FailureHandler), the engine runs it through
//! [`TaskError::classify`]: errors already in the [`TaskError`] family pass through
//! unchanged, anything else is wrapped in [`TaskError::Automation`].

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by [`Step::perform`](crate::Step::perform).
///
/// Steps may return any error type with `?`; known [`TaskError`]s keep their kind.
pub type StepError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by scheduler backends.
///
/// A scheduling failure is fatal for the run that hit it.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The backend refused the job (for example the admission limit was reached).
    #[error("scheduler `{scheduler}` rejected job: {reason}")]
    Rejected {
        /// Scheduler name.
        scheduler: &'static str,
        /// Why the job was refused.
        reason: String,
    },

    /// The backend was shut down and accepts no new jobs.
    #[error("scheduler `{scheduler}` is closed")]
    Closed {
        /// Scheduler name.
        scheduler: &'static str,
    },

    /// An accepted job was dropped before it could run (backend or runtime shutdown).
    #[error("scheduled job was dropped before it ran")]
    Abandoned,

    /// No tokio runtime was available to host the pooled scheduler.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl ScheduleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stepvisor::ScheduleError;
    ///
    /// let err = ScheduleError::Closed { scheduler: "pooled" };
    /// assert_eq!(err.as_label(), "schedule_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ScheduleError::Rejected { .. } => "schedule_rejected",
            ScheduleError::Closed { .. } => "schedule_closed",
            ScheduleError::Abandoned => "schedule_abandoned",
            ScheduleError::NoRuntime => "schedule_no_runtime",
        }
    }
}

/// # Task-automation errors.
///
/// Steps may raise these directly to keep a caller-meaningful classification; the
/// engine raises the remaining variants itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Remote job did not reach a terminal state in time.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Remote job finished unsuccessfully.
    #[error("execution failed: {reason}")]
    Fail {
        /// Failure description.
        reason: String,
    },

    /// Non-recoverable error raised by a step.
    #[error("fatal error: {reason}")]
    Fatal {
        /// Failure description.
        reason: String,
    },

    /// Unclassified failure wrapped into the task-automation family.
    #[error("task automation failed: {source}")]
    Automation {
        /// The original error.
        #[source]
        source: StepError,
    },

    /// The scheduler could not arrange execution.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// A step panicked inside `perform()`.
    #[error("step `{step}` panicked: {info}")]
    Panicked {
        /// Step name.
        step: String,
        /// Panic payload, when it was a string.
        info: String,
    },

    /// A step kept asking to be rescheduled past the configured limit.
    #[error("step `{step}` requested rescheduling {attempts} times (limit {limit})")]
    RescheduleLimit {
        /// Step name.
        step: String,
        /// Reschedules requested so far.
        attempts: u32,
        /// Configured limit.
        limit: u32,
    },

    /// `next_step()` was called on an exhausted sequence.
    #[error("step sequence is exhausted")]
    SequenceExhausted,

    /// `run()` was called on a processor that already started.
    #[error("processor `{name}` already started")]
    AlreadyStarted {
        /// Processor name.
        name: String,
    },
}

impl TaskError {
    /// Classifies a step error: a [`TaskError`] passes through unchanged, any other
    /// error is wrapped in [`TaskError::Automation`] with the original as its source.
    ///
    /// # Example
    /// ```
    /// use stepvisor::{StepError, TaskError};
    ///
    /// let known: StepError = Box::new(TaskError::Fail { reason: "red build".into() });
    /// assert_eq!(TaskError::classify(known).as_label(), "task_failed");
    ///
    /// let io: StepError = Box::new(std::io::Error::other("reset by peer"));
    /// assert_eq!(TaskError::classify(io).as_label(), "task_automation");
    /// ```
    pub fn classify(err: StepError) -> TaskError {
        match err.downcast::<TaskError>() {
            Ok(known) => *known,
            Err(source) => TaskError::Automation { source },
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use stepvisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Automation { .. } => "task_automation",
            TaskError::Schedule(_) => "task_schedule",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::RescheduleLimit { .. } => "task_reschedule_limit",
            TaskError::SequenceExhausted => "task_sequence_exhausted",
            TaskError::AlreadyStarted { .. } => "task_already_started",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::Fail { reason } => format!("error: {reason}"),
            TaskError::Fatal { reason } => format!("fatal: {reason}"),
            TaskError::Automation { source } => format!("automation: {source}"),
            TaskError::Schedule(e) => format!("schedule: {e}"),
            TaskError::Panicked { step, info } => format!("panic in {step}: {info}"),
            TaskError::RescheduleLimit { step, limit, .. } => {
                format!("{step} exceeded {limit} reschedules")
            }
            TaskError::SequenceExhausted => "sequence exhausted".to_string(),
            TaskError::AlreadyStarted { name } => format!("{name} already started"),
        }
    }

    /// Indicates whether the error was raised by engine misuse rather than by a step
    /// or a scheduler.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            TaskError::SequenceExhausted | TaskError::AlreadyStarted { .. }
        )
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
