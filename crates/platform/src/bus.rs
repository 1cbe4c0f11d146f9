//! Shared bus arbitration.
//!
//! The e-paper panel and the seven-segment chain hang off the same serial
//! bus. [`BusArbiter`] is the single owner of two pieces of process-wide
//! state:
//!
//! - the **bus token**, a mutex held for exactly one bus transaction
//!   ([`BusArbiter::with_bus`]);
//! - the **busy flag**, an advisory atomic that a long multi-step operation
//!   raises before it starts and lowers after its trailing settle delay
//!   ([`BusArbiter::transaction`]).
//!
//! Low-priority users (the digit refresh loop) read [`BusArbiter::is_busy`]
//! and back off instead of queueing on the mutex, so a panel refresh is never
//! starved by clock ticks. The mutex, not the flag, is what guarantees that
//! two peripherals never drive the bus at the same time.
//!
//! ```text
//!  transaction():  owner ──┬── busy=1 ── settle ── [bus token: op] ── settle ── busy=0 ──┬──
//!                          └──────────────────── owner lock held ─────────────────────────┘
//!  with_bus():                                    [bus token: op]
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::config::SETTLE_DELAY;

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// A panicking bus user must not wedge every other peripheral; the guarded
/// data here is `()` or a plain flag, so there is no torn state to observe.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutual exclusion plus "busy" signalling for the shared bus.
///
/// Share it between components as `Arc<BusArbiter>`.
#[derive(Debug)]
pub struct BusArbiter {
    /// Bus token: held for the I/O step of a single transaction only.
    bus: Mutex<()>,
    /// Serialises busy brackets so only one operation owns the busy flag.
    owner: Mutex<()>,
    /// Lock-free mirror of `busy_state` for [`BusArbiter::is_busy`].
    busy: AtomicBool,
    /// Busy state guarded for condition-variable waits.
    busy_state: Mutex<bool>,
    idle: Condvar,
    settle: Duration,
}

impl BusArbiter {
    /// Create an arbiter whose busy brackets wait `settle` before and after
    /// the bus I/O step.
    pub fn new(settle: Duration) -> Self {
        Self {
            bus: Mutex::new(()),
            owner: Mutex::new(()),
            busy: AtomicBool::new(false),
            busy_state: Mutex::new(false),
            idle: Condvar::new(),
            settle,
        }
    }

    /// Settle delay applied around every busy bracket.
    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// `true` while a busy bracket is in progress.
    ///
    /// Lock-free; safe to call from any thread at any rate.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run `op` while holding the bus token.
    ///
    /// The token is released as soon as `op` returns (or unwinds).
    pub fn with_bus<R>(&self, op: impl FnOnce() -> R) -> R {
        let _token = lock(&self.bus);
        op()
    }

    /// Run `op` as a busy-bracketed transaction.
    ///
    /// Sequence: take ownership, assert busy, wait the settle delay, run `op`
    /// under the bus token, wait the settle delay, clear busy. Busy is cleared
    /// on every exit path, including `op` returning an error or panicking.
    pub fn transaction<R>(&self, op: impl FnOnce() -> R) -> R {
        let _owner = lock(&self.owner);
        let _busy = BusyGuard::assert(self);
        thread::sleep(self.settle);
        self.with_bus(op)
        // `_busy` drops first: trailing settle, then busy=false, then owner released.
    }

    /// Block until the busy flag is clear or `timeout` elapses.
    ///
    /// Returns `true` if the bus is idle on return.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let state = lock(&self.busy_state);
        let (state, _) = self
            .idle
            .wait_timeout_while(state, timeout, |busy| *busy)
            .unwrap_or_else(PoisonError::into_inner);
        !*state
    }

    fn set_busy(&self, busy: bool) {
        let mut state = lock(&self.busy_state);
        *state = busy;
        self.busy.store(busy, Ordering::Release);
        drop(state);
        self.idle.notify_all();
    }
}

impl Default for BusArbiter {
    fn default() -> Self {
        Self::new(SETTLE_DELAY)
    }
}

/// RAII busy flag: raised on construction, lowered (after the trailing settle
/// delay) on drop.
struct BusyGuard<'a> {
    arbiter: &'a BusArbiter,
}

impl<'a> BusyGuard<'a> {
    fn assert(arbiter: &'a BusArbiter) -> Self {
        arbiter.set_busy(true);
        tracing::trace!("bus busy asserted");
        Self { arbiter }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        thread::sleep(self.arbiter.settle);
        self.arbiter.set_busy(false);
        tracing::trace!("bus busy released");
    }
}
