//! Rendezvous channel: no storage, a sender and a receiver meet and
//! exchange one value.
//!
//! Parked parties of either kind sit in FIFO queues under the channel
//! mutex, each holding a pooled two-phase signal and, for direct
//! operations, a shared packet the value moves through. The counterpart
//! claims the signal (`READY → CLAIMED`), performs or arranges the
//! handoff, and notifies. A claim that fails means a selection already
//! committed elsewhere or a timed wait expired; such entries are
//! discarded and the scan continues.
//!
//! Committed selection transfers that cannot complete inline are staged in
//! reserved queues, so materializing a selection (`take_reserved` /
//! `place_reserved`) never has to search or block on channel state. Every
//! commit pushes exactly one reservation and every materialize pops
//! exactly one, closure markers included.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use oluk::pool;
use oluk::signal::{Signal, TAG_CLOSED, TAG_RETRY, TAG_XFER};

use crate::error::{
    RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError,
};
use crate::select::{Registration, Reservation};

/// Shared one-value slot a rendezvous moves through. The claim protocol
/// guarantees exactly one writer and one reader at a time.
struct Packet<T> {
    value: UnsafeCell<Option<T>>,
}

unsafe impl<T: Send> Send for Packet<T> {}
unsafe impl<T: Send> Sync for Packet<T> {}

impl<T> Packet<T> {
    fn empty() -> Arc<Self> {
        Arc::new(Self {
            value: UnsafeCell::new(None),
        })
    }

    fn loaded(value: T) -> Arc<Self> {
        Arc::new(Self {
            value: UnsafeCell::new(Some(value)),
        })
    }

    unsafe fn put(&self, value: T) {
        *self.value.get() = Some(value);
    }

    unsafe fn take(&self) -> Option<T> {
        (*self.value.get()).take()
    }
}

struct Waiter<T> {
    cell: Arc<Signal>,
    /// Present on direct operations; selection arms carry none.
    packet: Option<Arc<Packet<T>>>,
    /// `Some(index)` when the cell belongs to a parked selection.
    arm: Option<usize>,
}

/// A committed value source awaiting `take_reserved`.
enum Source<T> {
    /// A sender left the value behind and returned.
    Value(T),
    /// A parked direct sender; taking the value releases it.
    Waiter(Waiter<T>),
    /// The commit was closure; there is nothing to take.
    Closed,
}

/// A committed value sink awaiting `place_reserved`.
enum Sink<T> {
    /// A parked direct receiver; filling its packet releases it.
    Waiter(Waiter<T>),
    /// The commit was closure; the insert must fail.
    Closed,
}

struct Queues<T> {
    senders: VecDeque<Waiter<T>>,
    receivers: VecDeque<Waiter<T>>,
    reserved_send: VecDeque<Source<T>>,
    reserved_recv: VecDeque<Sink<T>>,
}

pub(crate) struct ZeroChannel<T> {
    queues: Mutex<Queues<T>>,
    closed: AtomicBool,
}

impl<T> ZeroChannel<T> {
    pub(crate) fn new() -> Self {
        Self {
            queues: Mutex::new(Queues {
                senders: VecDeque::new(),
                receivers: VecDeque::new(),
                reserved_send: VecDeque::new(),
                reserved_recv: VecDeque::new(),
            }),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn send(&self, value: T) -> Result<(), SendError<T>> {
        match self.send_deadline(value, None) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Closed(v)) => Err(SendError(v)),
            Err(SendTimeoutError::Timeout(_)) => unreachable!("undeadlined send timed out"),
        }
    }

    pub(crate) fn send_deadline(
        &self,
        value: T,
        deadline: Option<Instant>,
    ) -> Result<(), SendTimeoutError<T>> {
        let mut value = value;
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(SendTimeoutError::Closed(value));
            }
            let mut q = self.queues.lock().unwrap();
            if self.closed.load(Ordering::SeqCst) {
                return Err(SendTimeoutError::Closed(value));
            }

            // Hand off to the oldest receiver still claimable.
            let mut taken = None;
            while let Some(w) = q.receivers.pop_front() {
                if w.cell.claim() {
                    taken = Some(w);
                    break;
                }
            }
            if let Some(w) = taken {
                return match w.arm {
                    Some(arm) => {
                        // A selector owns this cell: commit its arm and
                        // stage the value for its extraction.
                        q.reserved_send.push_back(Source::Value(value));
                        drop(q);
                        w.cell.set_word(arm);
                        w.cell.notify();
                        Ok(())
                    }
                    None => {
                        unsafe { w.packet.as_ref().unwrap().put(value) };
                        drop(q);
                        w.cell.set_word(TAG_XFER);
                        w.cell.finish();
                        w.cell.notify();
                        Ok(())
                    }
                };
            }

            // Nobody to meet: park with the value attached.
            let cell = pool::obtain();
            let packet = Packet::loaded(value);
            q.senders.push_back(Waiter {
                cell: cell.clone(),
                packet: Some(packet.clone()),
                arm: None,
            });
            drop(q);

            if !cell.wait(deadline) {
                let v = unsafe { packet.take() }.expect("timed-out sender lost its value");
                pool::recycle(cell);
                return Err(SendTimeoutError::Timeout(v));
            }
            let word = cell.word();
            pool::recycle(cell);
            match word {
                TAG_XFER => return Ok(()),
                TAG_CLOSED => {
                    let v = unsafe { packet.take() }.expect("closed-out sender lost its value");
                    return Err(SendTimeoutError::Closed(v));
                }
                TAG_RETRY => {
                    value = unsafe { packet.take() }.expect("retried sender lost its value");
                }
                other => unreachable!("unexpected sender wake word {other}"),
            }
        }
    }

    pub(crate) fn recv(&self) -> Option<T> {
        match self.recv_deadline(None) {
            Ok(v) => Some(v),
            Err(RecvTimeoutError::Closed) => None,
            Err(RecvTimeoutError::Timeout) => unreachable!("undeadlined recv timed out"),
        }
    }

    pub(crate) fn recv_deadline(
        &self,
        deadline: Option<Instant>,
    ) -> Result<T, RecvTimeoutError> {
        loop {
            let mut q = self.queues.lock().unwrap();

            let mut taken = None;
            while let Some(w) = q.senders.pop_front() {
                if w.cell.claim() {
                    taken = Some(w);
                    break;
                }
            }
            if let Some(w) = taken {
                match w.arm {
                    Some(arm) => {
                        // A selector's send arm: commit it and park as the
                        // sink its insert will fill. The transfer is now
                        // certain, so this leg ignores the deadline.
                        let cell = pool::obtain();
                        let packet = Packet::empty();
                        q.reserved_recv.push_back(Sink::Waiter(Waiter {
                            cell: cell.clone(),
                            packet: Some(packet.clone()),
                            arm: None,
                        }));
                        drop(q);
                        w.cell.set_word(arm);
                        w.cell.notify();
                        cell.wait(None);
                        pool::recycle(cell);
                        let v =
                            unsafe { packet.take() }.expect("committed insert delivered no value");
                        return Ok(v);
                    }
                    None => {
                        let v = unsafe { w.packet.as_ref().unwrap().take() }
                            .expect("parked sender lost its value");
                        drop(q);
                        w.cell.set_word(TAG_XFER);
                        w.cell.finish();
                        w.cell.notify();
                        return Ok(v);
                    }
                }
            }

            if self.closed.load(Ordering::SeqCst) {
                return Err(RecvTimeoutError::Closed);
            }

            let cell = pool::obtain();
            let packet = Packet::empty();
            q.receivers.push_back(Waiter {
                cell: cell.clone(),
                packet: Some(packet.clone()),
                arm: None,
            });
            drop(q);

            if !cell.wait(deadline) {
                pool::recycle(cell);
                return Err(RecvTimeoutError::Timeout);
            }
            let word = cell.word();
            pool::recycle(cell);
            match word {
                TAG_XFER => {
                    let v = unsafe { packet.take() }.expect("rendezvous delivered no value");
                    return Ok(v);
                }
                TAG_CLOSED => return Err(RecvTimeoutError::Closed),
                TAG_RETRY => {}
                other => unreachable!("unexpected receiver wake word {other}"),
            }
        }
    }

    pub(crate) fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TrySendError::Closed(value));
        }
        let mut q = self.queues.lock().unwrap();
        if self.closed.load(Ordering::SeqCst) {
            return Err(TrySendError::Closed(value));
        }
        let mut taken = None;
        while let Some(w) = q.receivers.pop_front() {
            if w.cell.claim() {
                taken = Some(w);
                break;
            }
        }
        match taken {
            Some(w) => match w.arm {
                Some(arm) => {
                    q.reserved_send.push_back(Source::Value(value));
                    drop(q);
                    w.cell.set_word(arm);
                    w.cell.notify();
                    Ok(())
                }
                None => {
                    unsafe { w.packet.as_ref().unwrap().put(value) };
                    drop(q);
                    w.cell.set_word(TAG_XFER);
                    w.cell.finish();
                    w.cell.notify();
                    Ok(())
                }
            },
            None => Err(TrySendError::Full(value)),
        }
    }

    pub(crate) fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut q = self.queues.lock().unwrap();
        // Selection senders need a blocking sink to deliver through; a
        // non-blocking receive can only meet direct senders.
        let mut i = 0;
        while i < q.senders.len() {
            if q.senders[i].arm.is_some() {
                i += 1;
                continue;
            }
            let w = q.senders.remove(i).unwrap();
            if !w.cell.claim() {
                continue;
            }
            let v = unsafe { w.packet.as_ref().unwrap().take() }
                .expect("parked sender lost its value");
            drop(q);
            w.cell.set_word(TAG_XFER);
            w.cell.finish();
            w.cell.notify();
            return Ok(v);
        }
        if self.closed.load(Ordering::SeqCst) {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        }
    }

    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut q = self.queues.lock().unwrap();
        let senders: Vec<Waiter<T>> = q.senders.drain(..).collect();
        let receivers: Vec<Waiter<T>> = q.receivers.drain(..).collect();
        let mut wakes: Vec<(Arc<Signal>, usize, bool)> = Vec::new();
        for w in senders {
            if !w.cell.claim() {
                continue;
            }
            match w.arm {
                Some(arm) => {
                    // The selector still materializes its insert; give it
                    // a sink that reports closure.
                    q.reserved_recv.push_back(Sink::Closed);
                    wakes.push((w.cell, arm, false));
                }
                None => wakes.push((w.cell, TAG_CLOSED, true)),
            }
        }
        for w in receivers {
            if !w.cell.claim() {
                continue;
            }
            match w.arm {
                Some(arm) => {
                    q.reserved_send.push_back(Source::Closed);
                    wakes.push((w.cell, arm, false));
                }
                None => wakes.push((w.cell, TAG_CLOSED, true)),
            }
        }
        drop(q);
        for (cell, word, finish) in wakes {
            cell.set_word(word);
            if finish {
                cell.finish();
            }
            cell.notify();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Non-blocking selection reservation for a receive arm.
    pub(crate) fn reserve_recv(&self) -> Reservation {
        let mut q = self.queues.lock().unwrap();
        let mut i = 0;
        while i < q.senders.len() {
            if q.senders[i].arm.is_some() {
                i += 1;
                continue;
            }
            let w = q.senders.remove(i).unwrap();
            if !w.cell.claim() {
                continue;
            }
            q.reserved_send.push_back(Source::Waiter(w));
            return Reservation::Ready;
        }
        if self.closed.load(Ordering::SeqCst) {
            Reservation::Closed
        } else {
            Reservation::WouldBlock
        }
    }

    /// Non-blocking selection reservation for a send arm.
    pub(crate) fn reserve_send(&self) -> Reservation {
        if self.closed.load(Ordering::SeqCst) {
            return Reservation::Closed;
        }
        let mut q = self.queues.lock().unwrap();
        if self.closed.load(Ordering::SeqCst) {
            return Reservation::Closed;
        }
        let mut i = 0;
        while i < q.receivers.len() {
            if q.receivers[i].arm.is_some() {
                i += 1;
                continue;
            }
            let w = q.receivers.remove(i).unwrap();
            if !w.cell.claim() {
                continue;
            }
            q.reserved_recv.push_back(Sink::Waiter(w));
            return Reservation::Ready;
        }
        Reservation::WouldBlock
    }

    /// Blocking-phase registration of a receive arm.
    pub(crate) fn select_recv(&self, cell: &Arc<Signal>, arm: usize) -> Registration {
        let mut q = self.queues.lock().unwrap();
        let mut i = 0;
        while i < q.senders.len() {
            if q.senders[i].arm.is_some() {
                i += 1;
                continue;
            }
            let w = q.senders.remove(i).unwrap();
            if !w.cell.claim() {
                continue;
            }
            // The sender is ours if our own cell is still free.
            return if cell.claim() {
                q.reserved_send.push_back(Source::Waiter(w));
                drop(q);
                cell.set_word(arm);
                cell.notify();
                Registration::Won
            } else {
                // Committed elsewhere; send the sender around again.
                drop(q);
                w.cell.set_word(TAG_RETRY);
                w.cell.finish();
                w.cell.notify();
                Registration::Lost
            };
        }
        if self.closed.load(Ordering::SeqCst) {
            return Registration::Closed;
        }
        q.receivers.push_back(Waiter {
            cell: cell.clone(),
            packet: None,
            arm: Some(arm),
        });
        Registration::Parked
    }

    /// Blocking-phase registration of a send arm.
    pub(crate) fn select_send(&self, cell: &Arc<Signal>, arm: usize) -> Registration {
        if self.closed.load(Ordering::SeqCst) {
            return Registration::Closed;
        }
        let mut q = self.queues.lock().unwrap();
        if self.closed.load(Ordering::SeqCst) {
            return Registration::Closed;
        }
        let mut i = 0;
        while i < q.receivers.len() {
            if q.receivers[i].arm.is_some() {
                i += 1;
                continue;
            }
            let w = q.receivers.remove(i).unwrap();
            if !w.cell.claim() {
                continue;
            }
            return if cell.claim() {
                q.reserved_recv.push_back(Sink::Waiter(w));
                drop(q);
                cell.set_word(arm);
                cell.notify();
                Registration::Won
            } else {
                drop(q);
                w.cell.set_word(TAG_RETRY);
                w.cell.finish();
                w.cell.notify();
                Registration::Lost
            };
        }
        q.senders.push_back(Waiter {
            cell: cell.clone(),
            packet: None,
            arm: Some(arm),
        });
        Registration::Parked
    }

    /// Materializes a committed receive arm.
    pub(crate) fn take_reserved(&self) -> Option<T> {
        let mut q = self.queues.lock().unwrap();
        let source = q
            .reserved_send
            .pop_front()
            .expect("committed selection has no reserved sender");
        match source {
            Source::Value(v) => Some(v),
            Source::Waiter(w) => {
                let v = unsafe { w.packet.as_ref().unwrap().take() }
                    .expect("parked sender lost its value");
                drop(q);
                w.cell.set_word(TAG_XFER);
                w.cell.finish();
                w.cell.notify();
                Some(v)
            }
            Source::Closed => None,
        }
    }

    /// Materializes a committed send arm.
    pub(crate) fn place_reserved(&self, value: T) -> Result<(), SendError<T>> {
        let mut q = self.queues.lock().unwrap();
        let sink = q
            .reserved_recv
            .pop_front()
            .expect("committed selection has no reserved receiver");
        match sink {
            Sink::Waiter(w) => {
                unsafe { w.packet.as_ref().unwrap().put(value) };
                drop(q);
                w.cell.set_word(TAG_XFER);
                w.cell.finish();
                w.cell.notify();
                Ok(())
            }
            Sink::Closed => Err(SendError(value)),
        }
    }
}
