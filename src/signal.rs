//! Two-phase counted signal: a single-use wake token with a claim word.
//!
//! A [`Signal`] combines three things:
//!
//! - a signed counter with P/V semantics (`wait` decrements, `notify`
//!   increments, `wait` parks while the pre-decrement value was not
//!   positive),
//! - a tagged commit state advanced `READY → CLAIMED → DONE`, whose
//!   `READY → CLAIMED` compare-and-swap is the linearization point when
//!   several parties race to satisfy the same waiter,
//! - an opaque data word, written by the winning claimer before it
//!   notifies, carrying either a protocol marker or a small payload such
//!   as an arm index.
//!
//! A cell is consumed by exactly one wait/notify pair and is never shared
//! by two unrelated operations. Obtain cells from [`crate::pool`] rather
//! than constructing them ad hoc on hot paths.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::{self, Thread};
use std::time::Instant;

use crossbeam_utils::Backoff;

/// State: idle, claimable.
pub const READY: u8 = 0;
/// State: a party won the cell and owns its data word.
pub const CLAIMED: u8 = 1;
/// State: terminal; late claimers back off.
pub const DONE: u8 = 2;

/// Data word marker: a direct value handoff completed.
pub const TAG_XFER: usize = usize::MAX;
/// Data word marker: the waiter was woken because its resource closed.
pub const TAG_CLOSED: usize = usize::MAX - 1;
/// Data word marker: the handoff was rolled back; the waiter must go
/// around and queue again.
pub const TAG_RETRY: usize = usize::MAX - 2;

/// Largest data word usable as a payload (arm index) without colliding
/// with the reserved markers.
pub const MAX_PAYLOAD: usize = usize::MAX - 3;

/// A single-use two-phase signal.
pub struct Signal {
    count: AtomicI32,
    state: AtomicU8,
    word: AtomicUsize,
    woken: AtomicBool,
    sleeper: Mutex<Option<Thread>>,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    /// Creates an idle signal: counter 0, state [`READY`], empty word.
    pub fn new() -> Self {
        Self {
            count: AtomicI32::new(0),
            state: AtomicU8::new(READY),
            word: AtomicUsize::new(0),
            woken: AtomicBool::new(false),
            sleeper: Mutex::new(None),
        }
    }

    /// Waits for a notification, parking the calling thread if none has
    /// been posted yet.
    ///
    /// Returns `true` when notified. Returns `false` only when `deadline`
    /// passed while the cell was still [`READY`]; in that case the cell is
    /// atomically retired to [`DONE`], the counter is restored, and no
    /// claimer can commit to it anymore. If a claimer already committed
    /// when the deadline fires, the wait is treated as notified: the
    /// transfer is in flight and its notification is imminent.
    pub fn wait(&self, deadline: Option<Instant>) -> bool {
        let prev = self.count.fetch_sub(1, Ordering::SeqCst);
        assert!(prev > i32::MIN, "signal counter underflow");
        if prev > 0 {
            return true;
        }
        *self.sleeper.lock().unwrap() = Some(thread::current());
        loop {
            if self.woken.swap(false, Ordering::Acquire) {
                return true;
            }
            match deadline {
                None => thread::park(),
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        return self.cancel();
                    }
                    thread::park_timeout(at - now);
                }
            }
        }
    }

    /// Timed out. Retire the cell if it is still unclaimed, otherwise
    /// honor the commit that beat the deadline.
    fn cancel(&self) -> bool {
        if self
            .state
            .compare_exchange(READY, DONE, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            // Nobody can claim the cell now; pay our decrement back.
            self.count.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        // A claimer won the race; its notify() is on the way.
        loop {
            if self.woken.swap(false, Ordering::Acquire) {
                return true;
            }
            thread::park();
        }
    }

    /// Posts one notification, waking the parked waiter if there is one.
    ///
    /// Must only be called after a successful [`claim`](Self::claim) (or
    /// by the party that obtained the cell). If the waiter has not yet
    /// published its thread handle, spins briefly until it does.
    pub fn notify(&self) {
        let prev = self.count.fetch_add(1, Ordering::SeqCst);
        if prev >= 0 {
            // The wait has not started; the counter hands it the token.
            return;
        }
        self.woken.store(true, Ordering::Release);
        let backoff = Backoff::new();
        loop {
            if let Some(thread) = self.sleeper.lock().unwrap().clone() {
                thread.unpark();
                return;
            }
            // The waiter is between its decrement and publishing itself.
            backoff.snooze();
        }
    }

    /// Attempts the `READY → CLAIMED` transition.
    ///
    /// Exactly one of any number of racing claimers succeeds; the winner
    /// owns the data word until it notifies.
    #[inline]
    pub fn claim(&self) -> bool {
        self.state
            .compare_exchange(READY, CLAIMED, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }

    /// Unconditionally advances the state to [`DONE`].
    #[inline]
    pub fn finish(&self) {
        self.state.swap(DONE, Ordering::SeqCst);
    }

    /// Current state word; advisory except at protocol-defined points.
    #[inline]
    pub fn state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }

    /// Writes the data word. Caller must hold the claim.
    #[inline]
    pub fn set_word(&self, word: usize) {
        self.word.store(word, Ordering::Release);
    }

    /// Reads the data word. Meaningful only after a notified wait.
    #[inline]
    pub fn word(&self) -> usize {
        self.word.load(Ordering::Acquire)
    }

    /// Resets the cell to its idle configuration.
    ///
    /// Caller must guarantee exclusive access (see the pool's uniqueness
    /// check); a reset while any other party still observes the cell
    /// would let a stale claim commit against a recycled cell.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
        self.state.store(READY, Ordering::SeqCst);
        self.word.store(0, Ordering::SeqCst);
        self.woken.store(false, Ordering::SeqCst);
        *self.sleeper.lock().unwrap() = None;
    }
}
