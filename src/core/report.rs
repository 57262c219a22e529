//! # Run report.
//!
//! A [`RunReport`] is a snapshot of one run: which steps were fetched, how often each was
//! performed, how each ended, and how the run itself ended. Blocking runs return the final
//! report; callback runs return a snapshot from `run()` and the final one from `wait()`.

use std::time::{Duration, Instant};

use crate::core::state::RunState;
use crate::error::TaskError;

/// How one step of a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Scheduled or running when the snapshot was taken.
    InFlight,
    /// Performed successfully and did not ask to run again.
    Completed,
    /// Its last invocation failed (or it exceeded the reschedule limit).
    Failed,
    /// The run was canceled while this step was pending.
    Canceled,
}

/// Per-step entry of a [`RunReport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepRecord {
    /// Step name.
    pub name: String,
    /// Number of `perform()` calls on this instance.
    pub invocations: u32,
    /// How the step ended.
    pub outcome: StepOutcome,
}

/// Description of the error a run failed with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    /// Stable label, see [`TaskError::as_label`].
    pub label: &'static str,
    /// Display form of the error.
    pub message: String,
}

impl From<&TaskError> for Failure {
    fn from(err: &TaskError) -> Self {
        Self {
            label: err.as_label(),
            message: err.to_string(),
        }
    }
}

/// Snapshot of one processor run.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Processor name.
    pub processor: String,
    /// State at snapshot time.
    pub state: RunState,
    /// Fetched steps, in order.
    pub steps: Vec<StepRecord>,
    /// Total `perform()` calls across all steps.
    pub performs: u32,
    /// Time since `run()` (until the terminal transition, once reached).
    pub elapsed: Duration,
    /// Set when `state` is `Failed`.
    pub failure: Option<Failure>,
}

impl RunReport {
    /// Whether the run finished with every step completed.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    /// First record with the given step name.
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|r| r.name == name)
    }
}

/// Mutable accumulator behind [`RunReport`] snapshots.
#[derive(Default)]
pub(crate) struct Ledger {
    steps: Vec<StepRecord>,
    performs: u32,
    started: Option<Instant>,
    ended: Option<Instant>,
}

impl Ledger {
    pub(crate) fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub(crate) fn begin_step(&mut self, name: &str) {
        self.steps.push(StepRecord {
            name: name.to_string(),
            invocations: 0,
            outcome: StepOutcome::InFlight,
        });
    }

    pub(crate) fn invoked(&mut self) {
        self.performs += 1;
        if let Some(last) = self.steps.last_mut() {
            last.invocations += 1;
        }
    }

    pub(crate) fn performs(&self) -> u32 {
        self.performs
    }

    /// Sets the outcome of the current step.
    pub(crate) fn close_step(&mut self, outcome: StepOutcome) {
        if let Some(last) = self.steps.last_mut() {
            last.outcome = outcome;
        }
    }

    /// Stops the clock; a step still in flight takes `open` as its outcome.
    pub(crate) fn finish(&mut self, open: StepOutcome) {
        if let Some(last) = self.steps.last_mut() {
            if last.outcome == StepOutcome::InFlight {
                last.outcome = open;
            }
        }
        self.ended = Some(Instant::now());
    }

    pub(crate) fn snapshot(
        &self,
        processor: &str,
        state: RunState,
        failure: Option<Failure>,
    ) -> RunReport {
        let elapsed = match (self.started, self.ended) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        };
        RunReport {
            processor: processor.to_string(),
            state,
            steps: self.steps.clone(),
            performs: self.performs,
            elapsed,
            failure,
        }
    }
}
