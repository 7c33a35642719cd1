//! Process-wide cache of idle [`Signal`] cells.
//!
//! Parking a waiter costs one `Arc<Signal>`; recycling cells through this
//! pool keeps that off the allocator on hot paths. The pool only hands out
//! entries it holds the sole reference to: a cell abandoned in some waiter
//! queue (a selection that committed elsewhere, a timed-out wait) keeps an
//! outstanding clone alive, and [`obtain`] skips it until the queue has
//! discarded its copy.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::signal::Signal;
use crate::spin::Spinlock;

const POOL_CAP: usize = 256;

/// Bounded free-list of idle signal cells.
pub struct SignalPool {
    shelf: Spinlock<Vec<Arc<Signal>>>,
}

impl SignalPool {
    fn new() -> Self {
        Self {
            shelf: Spinlock::new(Vec::with_capacity(POOL_CAP)),
        }
    }

    fn get(&self) -> Arc<Signal> {
        let mut shelf = self.shelf.lock();
        // Scan from the top: recently returned cells are most likely to
        // have shed their outstanding references.
        for i in (0..shelf.len()).rev() {
            if Arc::strong_count(&shelf[i]) == 1 {
                let cell = shelf.swap_remove(i);
                cell.reset();
                return cell;
            }
        }
        drop(shelf);
        Arc::new(Signal::new())
    }

    fn put(&self, cell: Arc<Signal>) {
        let mut shelf = self.shelf.lock();
        if shelf.len() < POOL_CAP {
            shelf.push(cell);
        }
        // Otherwise drop it; the cache is full.
    }
}

static POOL: Lazy<SignalPool> = Lazy::new(SignalPool::new);

/// Fetches an idle cell from the process-wide pool, allocating if every
/// pooled entry is still observed elsewhere.
pub fn obtain() -> Arc<Signal> {
    POOL.get()
}

/// Returns a cell to the process-wide pool.
///
/// The cell may still be referenced by waiter queues that have not walked
/// past it yet; it becomes reusable once those references drop.
pub fn recycle(cell: Arc<Signal>) {
    POOL.put(cell);
}
