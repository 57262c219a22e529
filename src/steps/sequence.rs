//! # Step sequences.
//!
//! A [`StepSequence`] is the ordered, exhaustible source of steps for exactly one run.
//! The processor asks [`has_more`](StepSequence::has_more) before every
//! [`next_step`](StepSequence::next_step) and only after the previous step completed,
//! so a lazy sequence may build step `n + 1` from the outcome of step `n` (shared state
//! through an `Arc` is the usual way).
//!
//! ## Rules
//! - Once `has_more()` returned `false` it never returns `true` again.
//! - `next_step()` on an exhausted sequence fails fast with
//!   [`TaskError::SequenceExhausted`].
//! - Implementations are owned by one processor and need not be `Sync`.

use std::collections::VecDeque;

use crate::error::TaskError;
use crate::steps::step::BoxStep;

/// Ordered, exhaustible producer of steps for one run.
pub trait StepSequence: Send + 'static {
    /// Whether another step is available.
    fn has_more(&mut self) -> bool;

    /// Takes the next step.
    fn next_step(&mut self) -> Result<BoxStep, TaskError>;
}

/// Eager sequence over a fixed list of steps.
///
/// # Example
/// ```
/// use stepvisor::{Step, StepError, StepFn, StepList, StepSequence, StepStatus};
///
/// let mut seq: StepList = ["trigger", "await", "collect"]
///     .into_iter()
///     .map(|name| StepFn::boxed(name, |_| async { Ok::<_, StepError>(StepStatus::Complete) }))
///     .collect();
///
/// assert_eq!(seq.len(), 3);
/// assert_eq!(seq.next_step().unwrap().name(), "trigger");
/// ```
#[derive(Default)]
pub struct StepList {
    steps: VecDeque<BoxStep>,
}

impl StepList {
    /// Creates a sequence yielding `steps` in order.
    pub fn new(steps: Vec<BoxStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    /// Appends a step at the end.
    pub fn push(&mut self, step: BoxStep) {
        self.steps.push_back(step);
    }

    /// Remaining steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step remains.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FromIterator<BoxStep> for StepList {
    fn from_iter<I: IntoIterator<Item = BoxStep>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl StepSequence for StepList {
    fn has_more(&mut self) -> bool {
        !self.steps.is_empty()
    }

    fn next_step(&mut self) -> Result<BoxStep, TaskError> {
        self.steps.pop_front().ok_or(TaskError::SequenceExhausted)
    }
}

/// Lazy sequence backed by a generator closure.
///
/// The closure receives the 0-based index of the step to build and returns `None` when
/// the run has no further stages. At most one step is built ahead of
/// [`next_step`](StepSequence::next_step), and the closure is never called again after
/// its first `None`.
pub struct SequenceFn<F> {
    f: F,
    index: usize,
    peeked: Option<BoxStep>,
    exhausted: bool,
}

impl<F> SequenceFn<F>
where
    F: FnMut(usize) -> Option<BoxStep> + Send + 'static,
{
    /// Creates a lazy sequence.
    pub fn new(f: F) -> Self {
        Self {
            f,
            index: 0,
            peeked: None,
            exhausted: false,
        }
    }
}

impl<F> StepSequence for SequenceFn<F>
where
    F: FnMut(usize) -> Option<BoxStep> + Send + 'static,
{
    fn has_more(&mut self) -> bool {
        if self.peeked.is_some() {
            return true;
        }
        if self.exhausted {
            return false;
        }
        match (self.f)(self.index) {
            Some(step) => {
                self.index += 1;
                self.peeked = Some(step);
                true
            }
            None => {
                self.exhausted = true;
                false
            }
        }
    }

    fn next_step(&mut self) -> Result<BoxStep, TaskError> {
        if !self.has_more() {
            return Err(TaskError::SequenceExhausted);
        }
        self.peeked.take().ok_or(TaskError::SequenceExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::steps::step::Step;
    use crate::steps::step_fn::{StepFn, StepStatus};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn done(name: &'static str) -> BoxStep {
        StepFn::boxed(name, |_| async { Ok::<_, StepError>(StepStatus::Complete) })
    }

    #[test]
    fn list_yields_in_order_then_fails_fast() {
        let mut seq = StepList::new(vec![done("a"), done("b")]);
        assert!(seq.has_more());
        assert_eq!(seq.next_step().unwrap().name(), "a");
        assert_eq!(seq.next_step().unwrap().name(), "b");
        assert!(!seq.has_more());
        assert!(matches!(seq.next_step(), Err(TaskError::SequenceExhausted)));
        assert!(!seq.has_more());
    }

    #[test]
    fn generator_builds_at_most_one_ahead() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut seq = SequenceFn::new(move |i| {
            if i >= 3 {
                return None;
            }
            counter.fetch_add(1, Ordering::SeqCst);
            Some(done("gen"))
        });

        assert!(seq.has_more());
        assert!(seq.has_more());
        assert_eq!(built.load(Ordering::SeqCst), 1);

        seq.next_step().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
        seq.next_step().unwrap();
        seq.next_step().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 3);
        assert!(!seq.has_more());
    }

    #[test]
    fn generator_is_fused_after_first_none() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut seq = SequenceFn::new(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            if i == 1 { None } else { Some(done("x")) }
        });

        seq.next_step().unwrap();
        assert!(!seq.has_more());
        assert!(!seq.has_more());
        assert!(matches!(seq.next_step(), Err(TaskError::SequenceExhausted)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
