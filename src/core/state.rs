//! # Run state machine.
//!
//! ```text
//! NotStarted ──run()──► StepPending ─┬─ ok, needs rescheduling ──► StepNeedsReschedule
//!                                    ├─ ok, more steps ──────────► Advancing
//!                                    ├─ ok, exhausted ───────────► Done
//!                                    └─ error ───────────────────► Failed
//!
//! StepNeedsReschedule and Advancing take the same edges as StepPending.
//! Any non-terminal state ──cancel()──► Canceled
//! ```
//!
//! `Done`, `Failed` and `Canceled` are terminal.

use std::fmt;

/// Observable state of one processor run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// `run()` was not called yet.
    NotStarted,
    /// The first step is scheduled or running.
    StepPending,
    /// The current step asked to run again and is scheduled (possibly delayed).
    StepNeedsReschedule,
    /// A later step is scheduled or running.
    Advancing,
    /// The sequence was exhausted.
    Done,
    /// The run ended on an error.
    Failed,
    /// The run was canceled.
    Canceled,
}

impl RunState {
    /// Whether the run can make no further progress.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed | RunState::Canceled)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            RunState::NotStarted => "not_started",
            RunState::StepPending => "step_pending",
            RunState::StepNeedsReschedule => "step_needs_reschedule",
            RunState::Advancing => "advancing",
            RunState::Done => "done",
            RunState::Failed => "failed",
            RunState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_three_states_are_terminal() {
        let terminal: Vec<_> = [
            RunState::NotStarted,
            RunState::StepPending,
            RunState::StepNeedsReschedule,
            RunState::Advancing,
            RunState::Done,
            RunState::Failed,
            RunState::Canceled,
        ]
        .into_iter()
        .filter(|s| s.is_terminal())
        .collect();
        assert_eq!(
            terminal,
            vec![RunState::Done, RunState::Failed, RunState::Canceled]
        );
    }

    #[test]
    fn displays_label() {
        assert_eq!(RunState::StepNeedsReschedule.to_string(), "step_needs_reschedule");
    }
}
