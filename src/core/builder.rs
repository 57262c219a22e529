use std::sync::Arc;
use std::time::Duration;

use crate::{
    core::{DriveMode, Processor, ProcessorConfig},
    core::handler::{FailureHandler, LogFailure},
    events::Bus,
    policies::BackoffPolicy,
    scheduling::{SameThreadScheduler, Scheduler},
    steps::StepSequence,
};

/// Builder for a [`Processor`].
///
/// Starts with a [`SameThreadScheduler`], [`ProcessorConfig::default`], the
/// [`LogFailure`] handler and no event bus.
pub struct ProcessorBuilder<S> {
    cfg: ProcessorConfig,
    sequence: Box<dyn StepSequence>,
    scheduler: S,
    handler: Arc<dyn FailureHandler>,
    bus: Option<Bus>,
    own_bus: bool,
}

impl ProcessorBuilder<SameThreadScheduler> {
    /// Creates a new builder for the given sequence.
    pub fn new(sequence: impl StepSequence) -> Self {
        Self {
            cfg: ProcessorConfig::default(),
            sequence: Box::new(sequence),
            scheduler: SameThreadScheduler,
            handler: Arc::new(LogFailure),
            bus: None,
            own_bus: false,
        }
    }
}

impl<S: Scheduler> ProcessorBuilder<S> {
    /// Replaces the scheduler backend.
    pub fn scheduler<T: Scheduler>(self, scheduler: T) -> ProcessorBuilder<T> {
        ProcessorBuilder {
            cfg: self.cfg,
            sequence: self.sequence,
            scheduler,
            handler: self.handler,
            bus: self.bus,
            own_bus: self.own_bus,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, cfg: ProcessorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the processor name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.cfg.name = name.into();
        self
    }

    /// Sets the drive mode.
    pub fn mode(mut self, mode: DriveMode) -> Self {
        self.cfg.mode = mode;
        self
    }

    /// Uses a constant default backoff interval.
    pub fn default_interval(mut self, interval: Duration) -> Self {
        self.cfg.backoff = BackoffPolicy::constant(interval);
        self
    }

    /// Sets the default backoff policy.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.cfg.backoff = backoff;
        self
    }

    /// Limits reschedules per step (`0` = unlimited).
    pub fn max_reschedules(mut self, limit: u32) -> Self {
        self.cfg.max_reschedules = limit;
        self
    }

    /// Sets the handler receiving the error that ends a callback-driven run.
    pub fn on_failure(mut self, handler: impl FailureHandler) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    /// Publishes run events to a shared bus.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self.own_bus = false;
        self
    }

    /// Publishes run events to a bus of its own, sized by `bus_capacity`.
    pub fn publish_events(mut self) -> Self {
        self.bus = None;
        self.own_bus = true;
        self
    }

    /// Builds the processor.
    pub fn build(self) -> Processor<S> {
        let bus = match self.bus {
            Some(bus) => Some(bus),
            None if self.own_bus => Some(Bus::new(self.cfg.bus_capacity_clamped())),
            None => None,
        };
        Processor::from_parts(self.cfg, self.sequence, self.scheduler, self.handler, bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunState;
    use crate::events::EventKind;
    use crate::steps::StepList;

    #[test]
    fn defaults_to_callback_on_the_same_thread() {
        let p = ProcessorBuilder::new(StepList::default()).name("nightly").build();
        assert_eq!(p.name(), "nightly");
        assert_eq!(p.mode(), DriveMode::Callback);
        assert_eq!(p.state(), RunState::NotStarted);
        assert!(p.subscribe().is_none());
    }

    #[test]
    fn own_bus_receives_run_events() {
        let p = ProcessorBuilder::new(StepList::default())
            .mode(DriveMode::Blocking)
            .publish_events()
            .build();
        let mut rx = p.subscribe().unwrap();
        p.run().unwrap();

        assert_eq!(rx.try_recv().unwrap().kind, EventKind::RunStarted);
        let done = rx.try_recv().unwrap();
        assert_eq!(done.kind, EventKind::RunCompleted);
        assert_eq!(done.processor.as_deref(), Some("processor"));
    }
}
