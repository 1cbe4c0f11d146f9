//! Cooperative cancellation for background threads.
//!
//! Every long-running loop (digit refresh, button polling, panel worker)
//! sleeps through [`StopSignal::wait_timeout`] instead of `thread::sleep`, so
//! a stop request interrupts the sleep immediately and the owner can join the
//! thread within a bounded time.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::bus::lock;

#[derive(Debug, Default)]
struct Inner {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Cloneable stop token shared between a thread and its owner.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    /// Create a token in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake every waiter.
    pub fn stop(&self) {
        *lock(&self.inner.stopped) = true;
        self.inner.wake.notify_all();
    }

    /// `true` once [`StopSignal::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        *lock(&self.inner.stopped)
    }

    /// Sleep for up to `timeout`, returning early if a stop is requested.
    ///
    /// Returns `true` if the signal is stopped on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let stopped = lock(&self.inner.stopped);
        let (stopped, _) = self
            .inner
            .wake
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

/// Join `handle`, giving up after `timeout`.
///
/// `std` has no timed join, so this polls [`JoinHandle::is_finished`]. Returns
/// `true` if the thread finished (and was joined) in time; on timeout the
/// handle is dropped and the thread is left detached.
pub fn join_with_timeout<T>(handle: JoinHandle<T>, timeout: Duration) -> bool {
    const POLL: Duration = Duration::from_millis(5);
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL);
    }
    handle.join().is_ok()
}
