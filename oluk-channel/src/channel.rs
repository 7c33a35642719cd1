use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{
    RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError,
};
use crate::flavors::array::ArrayChannel;
use crate::flavors::slot::SlotChannel;
use crate::flavors::zero::ZeroChannel;

enum Flavor<T> {
    Zero(ZeroChannel<T>),
    Slot(SlotChannel<T>),
    Array(ArrayChannel<T>),
}

/// A typed, in-process FIFO communication endpoint.
///
/// Capacity picks the implementation: `0` is a rendezvous channel where a
/// sender and a receiver meet directly, `1` is a single buffered slot, and
/// anything larger is a fixed-capacity ring (clamped to 32768).
///
/// All operations take `&self`; a `Channel` wrapped in an [`Arc`] (or the
/// [`channel`] endpoint pair) is a multi-producer multi-consumer channel.
pub struct Channel<T> {
    flavor: Flavor<T>,
}

impl<T> Channel<T> {
    /// Constructs a channel of the given capacity.
    pub fn new(capacity: usize) -> Self {
        let flavor = match capacity {
            0 => Flavor::Zero(ZeroChannel::new()),
            1 => Flavor::Slot(SlotChannel::new()),
            n => Flavor::Array(ArrayChannel::new(n)),
        };
        Self { flavor }
    }

    /// Sends a message, blocking while the channel is full (or, for a
    /// rendezvous channel, until a receiver arrives).
    ///
    /// Fails only when the channel is closed; the message is handed back.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        match &self.flavor {
            Flavor::Zero(c) => c.send(value),
            Flavor::Slot(c) => c.send(value),
            Flavor::Array(c) => c.send(value),
        }
    }

    /// Sends a message, giving up after `timeout`.
    pub fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        let deadline = Instant::now() + timeout;
        match &self.flavor {
            Flavor::Zero(c) => c.send_deadline(value, Some(deadline)),
            Flavor::Slot(c) => c.send_deadline(value, deadline),
            Flavor::Array(c) => c.send_deadline(value, deadline),
        }
    }

    /// Sends a message only if that is possible without blocking.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        match &self.flavor {
            Flavor::Zero(c) => c.try_send(value),
            Flavor::Slot(c) => c.try_send(value),
            Flavor::Array(c) => c.try_send(value),
        }
    }

    /// Receives a message, blocking while the channel is empty.
    ///
    /// Returns `None` once the channel is closed and drained.
    pub fn recv(&self) -> Option<T> {
        match &self.flavor {
            Flavor::Zero(c) => c.recv(),
            Flavor::Slot(c) => c.recv(),
            Flavor::Array(c) => c.recv(),
        }
    }

    /// Receives a message, giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        match &self.flavor {
            Flavor::Zero(c) => c.recv_deadline(Some(deadline)),
            Flavor::Slot(c) => c.recv_deadline(deadline),
            Flavor::Array(c) => c.recv_deadline(deadline),
        }
    }

    /// Receives a message only if one is immediately available.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        match &self.flavor {
            Flavor::Zero(c) => c.try_recv(),
            Flavor::Slot(c) => c.try_recv(),
            Flavor::Array(c) => c.try_recv(),
        }
    }

    /// Closes the channel. Idempotent; wakes every parked waiter.
    ///
    /// Messages already buffered remain receivable; new sends fail.
    pub fn close(&self) {
        match &self.flavor {
            Flavor::Zero(c) => c.close(),
            Flavor::Slot(c) => c.close(),
            Flavor::Array(c) => c.close(),
        }
    }

    /// Whether the channel has been closed. Monotonic.
    pub fn is_closed(&self) -> bool {
        match &self.flavor {
            Flavor::Zero(c) => c.is_closed(),
            Flavor::Slot(c) => c.is_closed(),
            Flavor::Array(c) => c.is_closed(),
        }
    }

    /// Number of buffered messages. Advisory: may race with concurrent
    /// operations; never use it for correctness.
    pub fn len(&self) -> usize {
        match &self.flavor {
            Flavor::Zero(_) => 0,
            Flavor::Slot(c) => c.len(),
            Flavor::Array(c) => c.len(),
        }
    }

    /// Whether no message is buffered. Advisory, like [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the buffer is at capacity. Advisory. A rendezvous channel
    /// is always full.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Buffer capacity; `0` for a rendezvous channel.
    pub fn capacity(&self) -> usize {
        match &self.flavor {
            Flavor::Zero(_) => 0,
            Flavor::Slot(_) => 1,
            Flavor::Array(c) => c.capacity(),
        }
    }

    /// Identity used by selection to match completions to arms.
    pub(crate) fn addr(&self) -> usize {
        self as *const Self as usize
    }

    pub(crate) fn reserve_dir(&self, recv: bool) -> crate::select::Reservation {
        match &self.flavor {
            Flavor::Zero(c) => {
                if recv {
                    c.reserve_recv()
                } else {
                    c.reserve_send()
                }
            }
            Flavor::Slot(c) => {
                if recv {
                    c.reserve_recv()
                } else {
                    c.reserve_send()
                }
            }
            Flavor::Array(c) => {
                if recv {
                    c.reserve_recv()
                } else {
                    c.reserve_send()
                }
            }
        }
    }

    pub(crate) fn register_dir(
        &self,
        recv: bool,
        cell: &Arc<oluk::Signal>,
        arm: usize,
    ) -> crate::select::Registration {
        match &self.flavor {
            Flavor::Zero(c) => {
                if recv {
                    c.select_recv(cell, arm)
                } else {
                    c.select_send(cell, arm)
                }
            }
            Flavor::Slot(c) => {
                if recv {
                    c.select_recv(cell, arm)
                } else {
                    c.select_send(cell, arm)
                }
            }
            Flavor::Array(c) => {
                if recv {
                    c.select_recv(cell, arm)
                } else {
                    c.select_send(cell, arm)
                }
            }
        }
    }

    pub(crate) fn take_reserved(&self) -> Option<T> {
        match &self.flavor {
            Flavor::Zero(c) => c.take_reserved(),
            Flavor::Slot(c) => c.take_reserved(),
            Flavor::Array(c) => c.take_reserved(),
        }
    }

    pub(crate) fn place_reserved(&self, value: T) -> Result<(), SendError<T>> {
        match &self.flavor {
            Flavor::Zero(c) => c.place_reserved(value),
            Flavor::Slot(c) => c.place_reserved(value),
            Flavor::Array(c) => c.place_reserved(value),
        }
    }

    /// Selection support: this channel as an untyped selection target.
    pub(crate) fn as_target(&self) -> &dyn crate::select::Target {
        self
    }

    /// Identity helper so `select!` accepts channels and endpoints alike.
    pub fn as_channel(&self) -> &Channel<T> {
        self
    }
}

struct Shared<T> {
    chan: Channel<T>,
    senders: AtomicUsize,
    receivers: AtomicUsize,
}

/// The sending half of a channel. Cloneable; the channel closes when the
/// last `Sender` is dropped.
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Sender<T> {
    /// Sends a message, blocking while the channel is full.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        self.shared.chan.send(value)
    }

    /// Sends a message, giving up after `timeout`.
    pub fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        self.shared.chan.send_timeout(value, timeout)
    }

    /// Sends a message only if that is possible without blocking.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        self.shared.chan.try_send(value)
    }

    /// Closes the channel for every endpoint.
    pub fn close(&self) {
        self.shared.chan.close()
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.chan.is_closed()
    }

    /// Whether the buffer is at capacity. Advisory.
    pub fn is_full(&self) -> bool {
        self.shared.chan.is_full()
    }

    /// Number of buffered messages. Advisory.
    pub fn len(&self) -> usize {
        self.shared.chan.len()
    }

    /// Whether no message is buffered. Advisory.
    pub fn is_empty(&self) -> bool {
        self.shared.chan.is_empty()
    }

    /// Buffer capacity; `0` for a rendezvous channel.
    pub fn capacity(&self) -> usize {
        self.shared.chan.capacity()
    }

    /// The underlying channel, e.g. for selection arms.
    pub fn as_channel(&self) -> &Channel<T> {
        &self.shared.chan
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::SeqCst);
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.chan.close();
        }
    }
}

/// The receiving half of a channel. Cloneable; the channel closes when the
/// last `Receiver` is dropped.
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Receiver<T> {
    /// Receives a message, blocking while the channel is empty. Returns
    /// `None` once the channel is closed and drained.
    pub fn recv(&self) -> Option<T> {
        self.shared.chan.recv()
    }

    /// Receives a message, giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.shared.chan.recv_timeout(timeout)
    }

    /// Receives a message only if one is immediately available.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.shared.chan.try_recv()
    }

    /// Closes the channel for every endpoint.
    pub fn close(&self) {
        self.shared.chan.close()
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.chan.is_closed()
    }

    /// Number of buffered messages. Advisory.
    pub fn len(&self) -> usize {
        self.shared.chan.len()
    }

    /// Whether no message is buffered. Advisory.
    pub fn is_empty(&self) -> bool {
        self.shared.chan.is_empty()
    }

    /// Buffer capacity; `0` for a rendezvous channel.
    pub fn capacity(&self) -> usize {
        self.shared.chan.capacity()
    }

    /// The underlying channel, e.g. for selection arms.
    pub fn as_channel(&self) -> &Channel<T> {
        &self.shared.chan
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        self.shared.receivers.fetch_add(1, Ordering::SeqCst);
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        if self.shared.receivers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.shared.chan.close();
        }
    }
}

/// Creates a channel of the given capacity and returns its endpoints.
///
/// `0` builds a rendezvous channel, `1` a single buffered slot, larger
/// values a fixed-capacity ring.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        chan: Channel::new(capacity),
        senders: AtomicUsize::new(1),
        receivers: AtomicUsize::new(1),
    });
    (
        Sender {
            shared: shared.clone(),
        },
        Receiver { shared },
    )
}
