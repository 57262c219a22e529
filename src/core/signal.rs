//! # Cancellable blocking wait.
//!
//! Blocking-mode runs sleep out reschedule delays on the driving thread. [`CancelSignal`]
//! pairs the processor's cancellation flag with a condition variable so `cancel()` wakes
//! such a sleep immediately instead of at the deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Monotonic cancellation flag with a wake-up for blocked waiters.
#[derive(Debug, Default)]
pub(crate) struct CancelSignal {
    flag: AtomicBool,
    lock: Mutex<()>,
    cv: Condvar,
}

impl CancelSignal {
    /// Raises the flag; returns `false` if it was already raised.
    pub(crate) fn raise(&self) -> bool {
        if self.flag.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.cv.notify_all();
        true
    }

    #[inline]
    pub(crate) fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Blocks for `timeout` or until the flag is raised.
    ///
    /// A timeout too large to represent as a deadline waits for cancellation only.
    /// Returns `true` if the wait ended because of cancellation.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.is_raised() {
                return true;
            }
            let Some(deadline) = deadline else {
                guard = self.cv.wait(guard).unwrap_or_else(PoisonError::into_inner);
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = match self.cv.wait_timeout(guard, deadline - now) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_times_out_without_cancel() {
        let signal = CancelSignal::default();
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn raise_wakes_a_blocked_waiter() {
        let signal = Arc::new(CancelSignal::default());
        let waker = Arc::clone(&signal);
        let start = Instant::now();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            assert!(waker.raise());
        });

        assert!(signal.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        t.join().unwrap();
        assert!(!signal.raise());
    }

    #[test]
    fn unbounded_wait_ends_on_raise() {
        let signal = Arc::new(CancelSignal::default());
        let waker = Arc::clone(&signal);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            waker.raise();
        });

        assert!(signal.wait(Duration::MAX));
        t.join().unwrap();
    }
}
