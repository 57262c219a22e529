//! # Panic-isolated listener fan-out.
//!
//! [`ListenerSet`] delivers one notice to every registered listener in registration
//! order. Each call runs under `catch_unwind`; a panic is logged and the remaining
//! listeners still see the notice.
//!
//! **Warning**: `AssertUnwindSafe` is used, so a listener that panics while holding a
//! lock on its own shared state may leave that state inconsistent.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::{StepError, panic_message};
use crate::listeners::listener::{StepListener, StepNotice};

/// Ordered collection of listeners attached to one step.
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn StepListener>>,
}

impl ListenerSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn add(&mut self, listener: Arc<dyn StepListener>) {
        self.listeners.push(listener);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers a completion notice.
    pub fn notify_complete(&self, notice: &StepNotice<'_>) {
        for l in &self.listeners {
            Self::guarded(l.as_ref(), notice, || l.on_complete(notice));
        }
    }

    /// Delivers an error notice.
    pub fn notify_error(&self, notice: &StepNotice<'_>, error: &StepError) {
        for l in &self.listeners {
            Self::guarded(l.as_ref(), notice, || l.on_error(notice, error));
        }
    }

    fn guarded(listener: &dyn StepListener, notice: &StepNotice<'_>, f: impl FnOnce()) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
            tracing::warn!(
                listener = listener.name(),
                step = notice.step,
                info = %panic_message(payload.as_ref()),
                "step listener panicked"
            );
        }
    }
}
