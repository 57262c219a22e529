//! # Processor: drives one step sequence to completion.
//!
//! A [`Processor`] owns one [`StepSequence`], one [`Scheduler`] and the run state. Every
//! step completion goes through the same transition rule, whichever [`DriveMode`] is used:
//!
//! ```text
//! completion signal
//!   ├─► canceled?                 → Canceled, stop
//!   ├─► first call?               → fetch first step, delay 0       → StepPending
//!   ├─► step needs rescheduling?  → same instance, delay = suggested
//!   │                               interval or backoff interval    → StepNeedsReschedule
//!   ├─► more steps?               → fetch next step, delay 0        → Advancing
//!   └─► exhausted                 → Done
//! ```
//!
//! ## Drive modes
//! - **Blocking**: `run()` loops on the calling thread. Delays are a cancellable blocking
//!   wait; each invocation is handed to the scheduler and the caller blocks until it
//!   reports back. Errors are returned to the caller.
//! - **Callback**: `run()` schedules the first step and returns. The job of each
//!   invocation performs the next transition and schedules its successor. Errors go to
//!   the [`FailureHandler`].
//!
//! ## Rules
//! - At most one step invocation is in flight; the next is scheduled only after the
//!   previous one returned.
//! - The phase lock is never held while calling the scheduler (a same-thread scheduler
//!   runs the job inside `schedule`). A generation counter ties a returned handle to the
//!   transition that requested it.
//! - `cancel()` raises a monotonic flag and cancels the pending handle. A job that starts
//!   after the flag was raised skips `perform()`.
//! - A callback job dropped without running ends the run: `Canceled` if the flag is up,
//!   otherwise `Failed` with [`ScheduleError::Abandoned`].
//!
//! ## Example
//! ```rust
//! use stepvisor::{
//!     DriveMode, Processor, RunState, StepError, StepFn, StepList, StepStatus,
//! };
//!
//! let steps: StepList = vec![
//!     StepFn::boxed("trigger", |_| async { Ok::<_, StepError>(StepStatus::Complete) }),
//!     StepFn::boxed("await", |n| async move {
//!         Ok::<_, StepError>(if n < 3 { StepStatus::Again } else { StepStatus::Complete })
//!     }),
//! ]
//! .into_iter()
//! .collect();
//!
//! let processor = Processor::builder(steps).mode(DriveMode::Blocking).build();
//! let report = processor.run().unwrap();
//!
//! assert_eq!(report.state, RunState::Done);
//! assert_eq!(report.performs, 4);
//! assert_eq!(report.step("await").unwrap().invocations, 3);
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak, mpsc};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{broadcast, watch};

use crate::core::builder::ProcessorBuilder;
use crate::core::config::{DriveMode, ProcessorConfig};
use crate::core::handler::FailureHandler;
use crate::core::report::{Failure, Ledger, RunReport, StepOutcome};
use crate::core::signal::CancelSignal;
use crate::core::state::RunState;
use crate::error::{ScheduleError, TaskError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::scheduling::{Job, SameThreadScheduler, ScheduledHandle, Scheduler};
use crate::steps::{BoxStep, StepSequence};

const SUBMITTING: u8 = 0;
const ACCEPTED: u8 = 1;
const DROPPED: u8 = 2;

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Internal run phase; the public view is [`RunState`].
enum Phase {
    NotStarted,
    Active {
        state: RunState,
        generation: u64,
        handle: Option<ScheduledHandle>,
    },
    Done,
    Failed(Failure),
    Canceled,
}

impl Phase {
    fn state(&self) -> RunState {
        match self {
            Phase::NotStarted => RunState::NotStarted,
            Phase::Active { state, .. } => *state,
            Phase::Done => RunState::Done,
            Phase::Failed(_) => RunState::Failed,
            Phase::Canceled => RunState::Canceled,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed(_) | Phase::Canceled)
    }
}

enum End {
    Done,
    Canceled,
    Failed(Failure),
}

/// The step in flight and the number of its current invocation (1-based).
struct InFlight {
    step: BoxStep,
    invocation: u32,
}

enum Next {
    Run {
        flight: InFlight,
        delay: Duration,
        state: RunState,
    },
    Exhausted,
}

type Outcome = (InFlight, Result<(), TaskError>);

struct Inner<S> {
    cfg: ProcessorConfig,
    scheduler: S,
    sequence: Mutex<Box<dyn StepSequence>>,
    phase: Mutex<Phase>,
    started: AtomicBool,
    canceled: CancelSignal,
    ledger: Mutex<Ledger>,
    state_tx: watch::Sender<RunState>,
    handler: Arc<dyn FailureHandler>,
    bus: Option<Bus>,
}

/// Drives one [`StepSequence`] to completion on a [`Scheduler`].
///
/// Cheap to clone; clones control the same run. A processor runs once.
pub struct Processor<S: Scheduler = SameThreadScheduler> {
    inner: Arc<Inner<S>>,
}

impl<S: Scheduler> Clone for Processor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Processor<SameThreadScheduler> {
    /// Starts building a processor for `sequence` (same-thread scheduler, default config).
    pub fn builder(sequence: impl StepSequence) -> ProcessorBuilder<SameThreadScheduler> {
        ProcessorBuilder::new(sequence)
    }
}

impl<S: Scheduler> Processor<S> {
    pub(crate) fn from_parts(
        cfg: ProcessorConfig,
        sequence: Box<dyn StepSequence>,
        scheduler: S,
        handler: Arc<dyn FailureHandler>,
        bus: Option<Bus>,
    ) -> Self {
        let (state_tx, _) = watch::channel(RunState::NotStarted);
        Self {
            inner: Arc::new(Inner {
                cfg,
                scheduler,
                sequence: Mutex::new(sequence),
                phase: Mutex::new(Phase::NotStarted),
                started: AtomicBool::new(false),
                canceled: CancelSignal::default(),
                ledger: Mutex::new(Ledger::default()),
                state_tx,
                handler,
                bus,
            }),
        }
    }

    /// Processor name from its configuration.
    pub fn name(&self) -> &str {
        &self.inner.cfg.name
    }

    /// Drive mode from its configuration.
    pub fn mode(&self) -> DriveMode {
        self.inner.cfg.mode
    }

    /// Starts the run.
    ///
    /// - **Blocking**: drives every step and returns the final report, or the error that
    ///   ended the run (known [`TaskError`]s unchanged, others as `Automation`).
    /// - **Callback**: schedules the first step and returns a snapshot. With a same-thread
    ///   scheduler the snapshot is already terminal.
    ///
    /// A processor canceled before `run()` returns its (canceled) report without
    /// performing anything. A second call fails with [`TaskError::AlreadyStarted`].
    ///
    /// Blocking runs on a pooled scheduler park the calling thread: call them from a
    /// plain thread or `spawn_blocking`, never from an async worker.
    pub fn run(&self) -> Result<RunReport, TaskError> {
        let inner = &self.inner;
        {
            let mut phase = lock(&inner.phase);
            if inner.started.swap(true, Ordering::SeqCst) {
                return Err(TaskError::AlreadyStarted {
                    name: inner.cfg.name.clone(),
                });
            }
            if phase.is_terminal() {
                drop(phase);
                return Ok(inner.report());
            }
            *phase = Phase::Active {
                state: RunState::StepPending,
                generation: 0,
                handle: None,
            };
            lock(&inner.ledger).start();
            inner.state_tx.send_replace(RunState::StepPending);
        }

        inner.publish(Event::new(EventKind::RunStarted));
        tracing::debug!(
            processor = %inner.cfg.name,
            mode = ?inner.cfg.mode,
            scheduler = inner.scheduler.name(),
            "run started"
        );

        match inner.cfg.mode {
            DriveMode::Blocking => inner.drive_blocking(),
            DriveMode::Callback => {
                inner.kick_off();
                Ok(inner.report())
            }
        }
    }

    /// Cancels the run: no step is scheduled afterwards and a pending one is dropped.
    ///
    /// A running `perform()` is not interrupted. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Whether `cancel()` was called.
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.is_raised()
    }

    /// Whether `run()` was called.
    pub fn has_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        lock(&self.inner.phase).state()
    }

    /// Snapshot of the run so far.
    pub fn report(&self) -> RunReport {
        self.inner.report()
    }

    /// Waits until the run reaches a terminal state and returns the final report.
    ///
    /// Never resolves for a processor that is neither started nor canceled.
    pub async fn wait(&self) -> RunReport {
        let mut rx = self.inner.state_tx.subscribe();
        let _ = rx.wait_for(|s| s.is_terminal()).await;
        self.inner.report()
    }

    /// Subscribes to the run's event bus, if one was configured.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Event>> {
        self.inner.bus.as_ref().map(Bus::subscribe)
    }

    /// Returns a handle that cancels this run without keeping the processor alive.
    ///
    /// Useful inside steps or listeners owned by the processor itself.
    pub fn cancel_handle(&self) -> CancelHandle<S> {
        CancelHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<S: Scheduler> fmt::Debug for Processor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.inner.cfg.name)
            .field("mode", &self.inner.cfg.mode)
            .field("scheduler", &self.inner.scheduler.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Weak cancellation handle, see [`Processor::cancel_handle`].
pub struct CancelHandle<S: Scheduler> {
    inner: Weak<Inner<S>>,
}

impl<S: Scheduler> CancelHandle<S> {
    /// Cancels the run; `false` if the processor is gone.
    pub fn cancel(&self) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.cancel();
                true
            }
            None => false,
        }
    }
}

impl<S: Scheduler> Clone for CancelHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

/// Ends a callback run if its job is dropped unexecuted.
struct JobGuard<S: Scheduler> {
    inner: Arc<Inner<S>>,
    submission: Arc<AtomicU8>,
    armed: bool,
}

impl<S: Scheduler> JobGuard<S> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<S: Scheduler> Drop for JobGuard<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // dropped inside schedule_after: the submitter sees DROPPED and handles it
        let during_submit = self
            .submission
            .compare_exchange(SUBMITTING, DROPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !during_submit {
            self.inner.abandoned();
        }
    }
}

impl<S: Scheduler> Inner<S> {
    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev.with_processor(self.cfg.name.as_str()));
        }
    }

    fn report(&self) -> RunReport {
        let phase = lock(&self.phase);
        let failure = match &*phase {
            Phase::Failed(f) => Some(f.clone()),
            _ => None,
        };
        lock(&self.ledger).snapshot(&self.cfg.name, phase.state(), failure)
    }

    fn cancel(&self) {
        if !self.canceled.raise() {
            return;
        }
        tracing::debug!(processor = %self.cfg.name, "cancel requested");

        let mut phase = lock(&self.phase);
        let stop = match &*phase {
            Phase::NotStarted => true,
            Phase::Active {
                handle: Some(handle),
                ..
            } => handle.cancel(),
            _ => false,
        };
        if stop {
            self.terminate(&mut phase, End::Canceled);
        }
    }

    // ---- transition rule ----

    /// Computes the next invocation after `finished` (or the first one).
    fn transition(&self, finished: Option<InFlight>) -> Result<Next, TaskError> {
        let Some(flight) = finished else {
            return self.advance(RunState::StepPending);
        };
        if flight.step.needs_rescheduling() {
            return self.reschedule(flight);
        }
        self.completed(&flight);
        drop(flight);
        self.advance(RunState::Advancing)
    }

    fn advance(&self, state: RunState) -> Result<Next, TaskError> {
        let step = {
            let mut sequence = lock(&self.sequence);
            if !sequence.has_more() {
                return Ok(Next::Exhausted);
            }
            sequence.next_step()?
        };
        lock(&self.ledger).begin_step(step.name());
        Ok(Next::Run {
            flight: InFlight {
                step,
                invocation: 1,
            },
            delay: Duration::ZERO,
            state,
        })
    }

    fn reschedule(&self, mut flight: InFlight) -> Result<Next, TaskError> {
        let reschedules = flight.invocation;
        if let Some(limit) = self.cfg.reschedule_limit() {
            if reschedules > limit {
                lock(&self.ledger).close_step(StepOutcome::Failed);
                return Err(TaskError::RescheduleLimit {
                    step: flight.step.name().to_string(),
                    attempts: reschedules,
                    limit,
                });
            }
        }

        let delay = flight
            .step
            .suggested_interval()
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| self.cfg.backoff.interval(reschedules - 1));

        self.publish(
            Event::new(EventKind::StepRescheduled)
                .with_step(flight.step.name())
                .with_invocation(flight.invocation)
                .with_delay(delay),
        );
        tracing::debug!(
            processor = %self.cfg.name,
            step = flight.step.name(),
            invocation = flight.invocation,
            ?delay,
            "step needs rescheduling"
        );

        flight.invocation += 1;
        Ok(Next::Run {
            flight,
            delay,
            state: RunState::StepNeedsReschedule,
        })
    }

    fn completed(&self, flight: &InFlight) {
        lock(&self.ledger).close_step(StepOutcome::Completed);
        self.publish(
            Event::new(EventKind::StepCompleted)
                .with_step(flight.step.name())
                .with_invocation(flight.invocation),
        );
        tracing::debug!(
            processor = %self.cfg.name,
            step = flight.step.name(),
            invocations = flight.invocation,
            "step completed"
        );
    }

    fn step_failed(&self, flight: &InFlight, err: &TaskError) {
        lock(&self.ledger).close_step(StepOutcome::Failed);
        self.publish(
            Event::new(EventKind::StepFailed)
                .with_step(flight.step.name())
                .with_invocation(flight.invocation)
                .with_reason(err.to_string()),
        );
        tracing::debug!(
            processor = %self.cfg.name,
            step = flight.step.name(),
            invocation = flight.invocation,
            label = err.as_label(),
            "step failed"
        );
    }

    /// Ends a run whose cancellation was noticed after `finished` returned.
    fn settle_canceled(&self, finished: Option<&InFlight>) {
        if let Some(flight) = finished {
            if !flight.step.needs_rescheduling() {
                self.completed(flight);
            }
        }
        self.finish(End::Canceled);
    }

    /// Performs one invocation, classifying errors and catching panics.
    async fn invoke(&self, flight: &mut InFlight) -> Result<(), TaskError> {
        lock(&self.ledger).invoked();
        self.publish(
            Event::new(EventKind::StepStarting)
                .with_step(flight.step.name())
                .with_invocation(flight.invocation),
        );

        match AssertUnwindSafe(flight.step.perform()).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TaskError::classify(err)),
            Err(payload) => Err(TaskError::Panicked {
                step: flight.step.name().to_string(),
                info: panic_message(&*payload),
            }),
        }
    }

    // ---- phase bookkeeping ----

    /// Marks the next invocation as scheduled; `None` if the run is over or canceled.
    fn enter(&self, state: RunState) -> Option<u64> {
        let mut phase = lock(&self.phase);
        if phase.is_terminal() {
            return None;
        }
        if self.canceled.is_raised() {
            self.terminate(&mut phase, End::Canceled);
            return None;
        }
        let Phase::Active {
            state: current,
            generation,
            handle,
        } = &mut *phase
        else {
            return None;
        };
        *current = state;
        *generation += 1;
        *handle = None;
        let generation = *generation;
        self.state_tx.send_replace(state);
        Some(generation)
    }

    /// Stores the handle of invocation `generation` unless the run moved on.
    fn attach(&self, generation: u64, handle: ScheduledHandle) {
        let mut phase = lock(&self.phase);
        let current = matches!(
            &*phase,
            Phase::Active { generation: g, .. } if *g == generation
        );
        if !current {
            return;
        }
        if self.canceled.is_raised() {
            if handle.cancel() {
                self.terminate(&mut phase, End::Canceled);
            }
            return;
        }
        if let Phase::Active { handle: slot, .. } = &mut *phase {
            *slot = Some(handle);
        }
    }

    /// Moves a live run to its terminal phase; `false` if it already ended.
    fn terminate(&self, phase: &mut Phase, end: End) -> bool {
        if phase.is_terminal() {
            return false;
        }
        let (state, open) = match &end {
            End::Done => (RunState::Done, StepOutcome::Completed),
            End::Canceled => (RunState::Canceled, StepOutcome::Canceled),
            End::Failed(_) => (RunState::Failed, StepOutcome::Failed),
        };
        let performs = {
            let mut ledger = lock(&self.ledger);
            ledger.finish(open);
            ledger.performs()
        };
        let event = match &end {
            End::Done => Event::new(EventKind::RunCompleted).with_invocation(performs),
            End::Canceled => Event::new(EventKind::RunCanceled),
            End::Failed(f) => Event::new(EventKind::RunFailed).with_reason(f.message.as_str()),
        };

        *phase = match end {
            End::Done => Phase::Done,
            End::Canceled => Phase::Canceled,
            End::Failed(f) => Phase::Failed(f),
        };
        self.state_tx.send_replace(state);
        self.publish(event);
        tracing::debug!(processor = %self.cfg.name, %state, performs, "run ended");
        true
    }

    fn finish(&self, end: End) -> bool {
        let mut phase = lock(&self.phase);
        self.terminate(&mut phase, end)
    }

    // ---- blocking driver ----

    fn drive_blocking(self: &Arc<Self>) -> Result<RunReport, TaskError> {
        let mut finished: Option<InFlight> = None;
        loop {
            if self.canceled.is_raised() {
                self.settle_canceled(finished.as_ref());
                break;
            }
            let next = match self.transition(finished.take()) {
                Ok(next) => next,
                Err(err) => return Err(self.abort(err)),
            };
            let Next::Run {
                flight,
                delay,
                state,
            } = next
            else {
                self.finish(End::Done);
                break;
            };

            let Some(generation) = self.enter(state) else {
                break;
            };
            if !delay.is_zero() && self.canceled.wait(delay) {
                continue;
            }

            let (tx, rx) = mpsc::sync_channel(1);
            match self.scheduler.schedule_blocking(self.blocking_job(flight, tx)) {
                Ok(handle) => self.attach(generation, handle),
                Err(err) => return Err(self.abort(err.into())),
            }

            match rx.recv() {
                Ok((flight, Ok(()))) => finished = Some(flight),
                Ok((flight, Err(err))) => {
                    self.step_failed(&flight, &err);
                    return Err(self.abort(err));
                }
                Err(_) if self.canceled.is_raised() => {
                    self.finish(End::Canceled);
                    break;
                }
                Err(_) => return Err(self.abort(ScheduleError::Abandoned.into())),
            }
        }
        Ok(self.report())
    }

    fn blocking_job(self: &Arc<Self>, mut flight: InFlight, tx: mpsc::SyncSender<Outcome>) -> Job {
        let inner = Arc::clone(self);
        Box::pin(async move {
            if inner.canceled.is_raised() {
                return;
            }
            let res = inner.invoke(&mut flight).await;
            let _ = tx.send((flight, res));
        })
    }

    /// Records a blocking-mode failure and hands the error back for the caller.
    fn abort(&self, err: TaskError) -> TaskError {
        self.finish(End::Failed(Failure::from(&err)));
        err
    }

    // ---- callback driver ----

    fn kick_off(self: &Arc<Self>) {
        match self.transition(None) {
            Ok(next) => self.dispatch(next),
            Err(err) => self.fail(err),
        }
    }

    fn dispatch(self: &Arc<Self>, next: Next) {
        let Next::Run {
            flight,
            delay,
            state,
        } = next
        else {
            self.finish(End::Done);
            return;
        };
        let Some(generation) = self.enter(state) else {
            return;
        };

        let submission = Arc::new(AtomicU8::new(SUBMITTING));
        let job = self.callback_job(flight, Arc::clone(&submission));
        match self.scheduler.schedule_after(job, delay) {
            Ok(handle) => {
                let accepted = submission
                    .compare_exchange(SUBMITTING, ACCEPTED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if accepted {
                    self.attach(generation, handle);
                } else {
                    self.abandoned();
                }
            }
            Err(err) => self.fail(err.into()),
        }
    }

    fn callback_job(self: &Arc<Self>, mut flight: InFlight, submission: Arc<AtomicU8>) -> Job {
        let mut guard = JobGuard {
            inner: Arc::clone(self),
            submission,
            armed: true,
        };
        Box::pin(async move {
            if guard.inner.canceled.is_raised() {
                guard.disarm();
                guard.inner.finish(End::Canceled);
                return;
            }
            let res = guard.inner.invoke(&mut flight).await;
            guard.disarm();
            guard.inner.step_done(flight, res);
        })
    }

    fn step_done(self: &Arc<Self>, flight: InFlight, res: Result<(), TaskError>) {
        if let Err(err) = res {
            self.step_failed(&flight, &err);
            self.fail(err);
            return;
        }
        if self.canceled.is_raised() {
            self.settle_canceled(Some(&flight));
            return;
        }
        match self.transition(Some(flight)) {
            Ok(next) => self.dispatch(next),
            Err(err) => self.fail(err),
        }
    }

    /// Ends a callback run and hands the error to the failure handler.
    fn fail(&self, err: TaskError) {
        if self.finish(End::Failed(Failure::from(&err))) {
            self.handler.on_failure(&self.cfg.name, &err);
        }
    }

    fn abandoned(&self) {
        if self.canceled.is_raised() {
            self.finish(End::Canceled);
        } else {
            tracing::warn!(processor = %self.cfg.name, "scheduled step was dropped before it ran");
            self.fail(ScheduleError::Abandoned.into());
        }
    }
}
