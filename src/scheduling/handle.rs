//! # Cancellable handle to one scheduling request.
//!
//! ```text
//!   Pending ──try_start──► Started ──finish──► Finished
//!      │
//!      └──cancel──► Canceled
//! ```
//!
//! - `cancel()` only wins from `Pending`; once the job started it is a no-op.
//! - Canceling also fires a [`CancellationToken`] so a backend waiting on a timer can
//!   drop the job right away instead of at the deadline.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio_util::sync::CancellationToken;

const PENDING: u8 = 0;
const STARTED: u8 = 1;
const FINISHED: u8 = 2;
const CANCELED: u8 = 3;

struct Shared {
    state: AtomicU8,
    token: CancellationToken,
}

/// Cancellable reference to a pending or in-flight job.
///
/// Cheap to clone; all clones observe the same request.
#[derive(Clone)]
pub struct ScheduledHandle {
    shared: Arc<Shared>,
}

impl ScheduledHandle {
    /// Creates a handle in the pending state.
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(PENDING),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Cancels the request if it has not started yet.
    ///
    /// Returns `true` if this call prevented the job from running.
    pub fn cancel(&self) -> bool {
        let won = self
            .shared
            .state
            .compare_exchange(PENDING, CANCELED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.shared.token.cancel();
        }
        won
    }

    /// Whether the request was canceled before it ran.
    pub fn is_canceled(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == CANCELED
    }

    /// Whether the job has started (it may have finished already).
    pub fn is_started(&self) -> bool {
        matches!(self.shared.state.load(Ordering::Acquire), STARTED | FINISHED)
    }

    /// Whether the job ran to completion.
    pub fn is_finished(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == FINISHED
    }

    /// Claims the request for execution; `false` if it was canceled first.
    pub(crate) fn try_start(&self) -> bool {
        self.shared
            .state
            .compare_exchange(PENDING, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        self.shared.state.store(FINISHED, Ordering::Release);
    }

    /// Token fired when the request is canceled.
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.shared.token
    }
}

impl fmt::Debug for ScheduledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.shared.state.load(Ordering::Acquire) {
            PENDING => "pending",
            STARTED => "started",
            FINISHED => "finished",
            _ => "canceled",
        };
        f.debug_struct("ScheduledHandle")
            .field("state", &state)
            .finish()
    }
}
