//! Fixed-capacity ring-buffer channel.
//!
//! Capacity is clamped to 1..=32768; the backing array is the next power
//! of two so slot indexing is a mask. Monotonic 64-bit cursors advance
//! under per-side spinlocks, so one enqueue and one dequeue can run
//! concurrently; occupancy bounds come from the `empty`/`filled`
//! semaphores, whose waiter queues also park selection arms.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_utils::CachePadded;
use oluk::Signal;
use oluk::Spinlock;

use crate::error::{
    RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError,
};
use crate::select::{Registration, Reservation};
use crate::sem::{SelectAcquire, Semaphore};

const MAX_CAPACITY: usize = 32768;

pub(crate) struct ArrayChannel<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: u64,
    capacity: usize,
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    wlock: Spinlock<()>,
    rlock: Spinlock<()>,
    empty: Semaphore,
    filled: Semaphore,
    closed: AtomicBool,
}

unsafe impl<T: Send> Send for ArrayChannel<T> {}
unsafe impl<T: Send> Sync for ArrayChannel<T> {}

impl<T> ArrayChannel<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CAPACITY);
        let slots = capacity.next_power_of_two();
        let mut buffer = Vec::with_capacity(slots);
        for _ in 0..slots {
            buffer.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Self {
            buffer: buffer.into_boxed_slice(),
            mask: (slots - 1) as u64,
            capacity,
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            wlock: Spinlock::new(()),
            rlock: Spinlock::new(()),
            empty: Semaphore::new(capacity as i64),
            filled: Semaphore::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn send(&self, value: T) -> Result<(), SendError<T>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SendError(value));
        }
        self.empty.acquire();
        self.place_reserved(value)
    }

    pub(crate) fn send_deadline(
        &self,
        value: T,
        deadline: Instant,
    ) -> Result<(), SendTimeoutError<T>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SendTimeoutError::Closed(value));
        }
        if !self.empty.acquire_deadline(deadline) {
            return Err(SendTimeoutError::Timeout(value));
        }
        self.place_reserved(value)
            .map_err(|e| SendTimeoutError::Closed(e.0))
    }

    pub(crate) fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TrySendError::Closed(value));
        }
        if !self.empty.try_acquire() {
            return Err(TrySendError::Full(value));
        }
        self.place_reserved(value)
            .map_err(|e| TrySendError::Closed(e.0))
    }

    pub(crate) fn recv(&self) -> Option<T> {
        self.filled.acquire();
        self.take_reserved()
    }

    pub(crate) fn recv_deadline(&self, deadline: Instant) -> Result<T, RecvTimeoutError> {
        if !self.filled.acquire_deadline(deadline) {
            return Err(RecvTimeoutError::Timeout);
        }
        self.take_reserved().ok_or(RecvTimeoutError::Closed)
    }

    pub(crate) fn try_recv(&self) -> Result<T, TryRecvError> {
        if !self.filled.try_acquire() {
            return if self.closed.load(Ordering::SeqCst) {
                Err(TryRecvError::Closed)
            } else {
                Err(TryRecvError::Empty)
            };
        }
        self.take_reserved().ok_or(TryRecvError::Closed)
    }

    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // One release per side; woken parties observing closure pass the
        // ticket along until every waiter has seen it.
        self.empty.release();
        self.filled.release();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::SeqCst);
        let head = self.head.load(Ordering::SeqCst);
        tail.saturating_sub(head) as usize
    }

    pub(crate) fn reserve_send(&self) -> Reservation {
        if self.closed.load(Ordering::SeqCst) {
            return Reservation::Closed;
        }
        if self.empty.try_acquire() {
            Reservation::Ready
        } else {
            Reservation::WouldBlock
        }
    }

    pub(crate) fn reserve_recv(&self) -> Reservation {
        if self.filled.try_acquire() {
            Reservation::Ready
        } else if self.closed.load(Ordering::SeqCst) {
            Reservation::Closed
        } else {
            Reservation::WouldBlock
        }
    }

    pub(crate) fn select_send(&self, cell: &Arc<Signal>, arm: usize) -> Registration {
        if self.closed.load(Ordering::SeqCst) {
            return Registration::Closed;
        }
        match self.empty.select_acquire(cell, arm) {
            SelectAcquire::Won => Registration::Won,
            SelectAcquire::Lost => Registration::Lost,
            SelectAcquire::Parked => Registration::Parked,
        }
    }

    pub(crate) fn select_recv(&self, cell: &Arc<Signal>, arm: usize) -> Registration {
        if self.closed.load(Ordering::SeqCst) && self.len() == 0 {
            return Registration::Closed;
        }
        match self.filled.select_acquire(cell, arm) {
            SelectAcquire::Won => Registration::Won,
            SelectAcquire::Lost => Registration::Lost,
            SelectAcquire::Parked => Registration::Parked,
        }
    }

    /// Enqueues after an `empty` ticket was obtained.
    pub(crate) fn place_reserved(&self, value: T) -> Result<(), SendError<T>> {
        let guard = self.wlock.lock();
        if self.closed.load(Ordering::SeqCst) {
            drop(guard);
            // Do not consume capacity on a closed channel.
            self.empty.release();
            return Err(SendError(value));
        }
        let tail = self.tail.load(Ordering::Relaxed);
        let slot = &self.buffer[(tail & self.mask) as usize];
        unsafe { (*slot.get()).write(value) };
        self.tail.store(tail + 1, Ordering::SeqCst);
        drop(guard);
        self.filled.release();
        Ok(())
    }

    /// Dequeues after a `filled` ticket was obtained. `None` means the
    /// ticket came from closure, and the wake is passed along.
    pub(crate) fn take_reserved(&self) -> Option<T> {
        let guard = self.rlock.lock();
        let head = self.head.load(Ordering::Relaxed);
        if self.tail.load(Ordering::SeqCst) == head {
            drop(guard);
            assert!(
                self.closed.load(Ordering::SeqCst),
                "consumer ticket on an open empty buffer"
            );
            self.filled.release();
            return None;
        }
        let slot = &self.buffer[(head & self.mask) as usize];
        let value = unsafe { (*slot.get()).assume_init_read() };
        self.head.store(head + 1, Ordering::SeqCst);
        drop(guard);
        self.empty.release();
        Some(value)
    }
}

impl<T> Drop for ArrayChannel<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        for i in head..tail {
            let slot = &self.buffer[(i & self.mask) as usize];
            unsafe { (*slot.get()).assume_init_drop() };
        }
    }
}
