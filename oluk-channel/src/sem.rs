//! Counting semaphore whose waiters park on pooled two-phase signals.
//!
//! The permit counter is signed: `acquire` decrements first and parks when
//! the pre-decrement value was not positive, so a negative count is the
//! number of waiters owed a permit. `release` pays one waiter directly by
//! claiming its cell and notifying it, which is also how a selection arm
//! parked here gets committed: the claim *is* the commit.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_utils::Backoff;
use oluk::freelist::{LinkQueue, NodePool};
use oluk::pool;
use oluk::signal::{Signal, TAG_XFER};
use oluk::Spinlock;

/// Process-wide node cache for every semaphore's waiter queue.
static WAITER_NODES: NodePool<Waiter> = NodePool::new();

struct Waiter {
    cell: Arc<Signal>,
    /// `Some(arm)` for a parked selection, `None` for a direct acquire.
    arm: Option<usize>,
}

/// Outcome of registering a selection arm.
pub(crate) enum SelectAcquire {
    /// The resource was available and this arm won the selection.
    Won,
    /// The resource was available but the selection had already committed
    /// elsewhere; the permit was handed back.
    Lost,
    /// No resource; the selection cell is parked in the waiter queue.
    Parked,
}

pub(crate) struct Semaphore {
    permits: AtomicI64,
    waiters: Spinlock<LinkQueue<Waiter>>,
}

impl Semaphore {
    pub(crate) fn new(permits: i64) -> Self {
        Self {
            permits: AtomicI64::new(permits),
            waiters: Spinlock::new(LinkQueue::new(&WAITER_NODES)),
        }
    }

    /// Takes one permit, parking until one is released.
    pub(crate) fn acquire(&self) {
        let prev = self.permits.fetch_sub(1, Ordering::SeqCst);
        if prev > 0 {
            return;
        }
        let cell = pool::obtain();
        self.waiters.lock().push_back(Waiter {
            cell: cell.clone(),
            arm: None,
        });
        cell.wait(None);
        pool::recycle(cell);
    }

    /// Takes one permit, giving up at `deadline`.
    ///
    /// On timeout the parked cell is retired in place; the next release
    /// that walks past it settles the abandoned decrement. If a release
    /// claims the cell in the same instant the deadline fires, the permit
    /// handoff wins and the acquire succeeds.
    pub(crate) fn acquire_deadline(&self, deadline: Instant) -> bool {
        let prev = self.permits.fetch_sub(1, Ordering::SeqCst);
        if prev > 0 {
            return true;
        }
        let cell = pool::obtain();
        self.waiters.lock().push_back(Waiter {
            cell: cell.clone(),
            arm: None,
        });
        let notified = cell.wait(Some(deadline));
        pool::recycle(cell);
        notified
    }

    /// Takes one permit only if one is free right now.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut permits = self.permits.load(Ordering::SeqCst);
        loop {
            if permits <= 0 {
                return false;
            }
            match self.permits.compare_exchange(
                permits,
                permits - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(cur) => permits = cur,
            }
        }
    }

    /// Registers a selection arm: takes a permit and commits the arm if
    /// one is free, otherwise parks `cell` in the waiter queue.
    pub(crate) fn select_acquire(&self, cell: &Arc<Signal>, arm: usize) -> SelectAcquire {
        let prev = self.permits.fetch_sub(1, Ordering::SeqCst);
        if prev > 0 {
            if cell.claim() {
                cell.set_word(arm);
                cell.notify();
                SelectAcquire::Won
            } else {
                // Committed elsewhere; free the permit for another party.
                self.release();
                SelectAcquire::Lost
            }
        } else {
            self.waiters.lock().push_back(Waiter {
                cell: cell.clone(),
                arm: Some(arm),
            });
            SelectAcquire::Parked
        }
    }

    /// Returns one permit, handing it straight to the oldest live waiter.
    pub(crate) fn release(&self) {
        let prev = self.permits.fetch_add(1, Ordering::SeqCst);
        if prev >= 0 {
            return;
        }
        // Somebody is owed this permit. The waiter may still be between
        // its decrement and its enqueue; spin until it shows up.
        let backoff = Backoff::new();
        loop {
            let popped = self.waiters.lock().pop_front();
            match popped {
                Some(waiter) => {
                    if waiter.cell.claim() {
                        match waiter.arm {
                            Some(arm) => waiter.cell.set_word(arm),
                            None => {
                                waiter.cell.set_word(TAG_XFER);
                                waiter.cell.finish();
                            }
                        }
                        waiter.cell.notify();
                        return;
                    }
                    // Stale entry: a selection that committed on another
                    // channel, or a timed-out acquire. Its decrement was
                    // never paid back; settle it and keep looking.
                    let paid = self.permits.fetch_add(1, Ordering::SeqCst);
                    if paid >= 0 {
                        return;
                    }
                }
                None => backoff.snooze(),
            }
        }
    }
}
