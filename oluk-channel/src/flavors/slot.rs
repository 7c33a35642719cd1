//! Single-slot buffered channel with counting-semaphore discipline.
//!
//! The simplest correct buffered design: an `empty` semaphore (initially
//! 1) serializes producers, a `filled` semaphore (initially 0) serializes
//! consumers, and the slot itself sits behind a spinlock. Closure releases
//! both semaphores once; a woken party that observes closure hands its
//! ticket back, so the wake cascades to every waiter.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use oluk::Signal;
use oluk::Spinlock;

use crate::error::{
    RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError,
};
use crate::select::{Registration, Reservation};
use crate::sem::{SelectAcquire, Semaphore};

pub(crate) struct SlotChannel<T> {
    value: Spinlock<Option<T>>,
    empty: Semaphore,
    filled: Semaphore,
    len: AtomicUsize,
    closed: AtomicBool,
}

impl<T> SlotChannel<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: Spinlock::new(None),
            empty: Semaphore::new(1),
            filled: Semaphore::new(0),
            len: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
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
        // Serialize with an in-flight write so its value stays drainable.
        drop(self.value.lock());
        self.empty.release();
        self.filled.release();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
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

    /// Writes the slot after an `empty` ticket was obtained.
    pub(crate) fn place_reserved(&self, value: T) -> Result<(), SendError<T>> {
        {
            let mut slot = self.value.lock();
            if self.closed.load(Ordering::SeqCst) {
                drop(slot);
                // Do not consume capacity on a closed channel.
                self.empty.release();
                return Err(SendError(value));
            }
            *slot = Some(value);
        }
        self.len.store(1, Ordering::SeqCst);
        self.filled.release();
        Ok(())
    }

    /// Empties the slot after a `filled` ticket was obtained. `None` means
    /// the ticket came from closure, and the wake is passed along.
    pub(crate) fn take_reserved(&self) -> Option<T> {
        let taken = self.value.lock().take();
        match taken {
            Some(v) => {
                self.len.store(0, Ordering::SeqCst);
                self.empty.release();
                Some(v)
            }
            None => {
                assert!(
                    self.closed.load(Ordering::SeqCst),
                    "consumer ticket on an open empty slot"
                );
                self.filled.release();
                None
            }
        }
    }
}
