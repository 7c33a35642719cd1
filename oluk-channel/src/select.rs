//! Multi-way selection: commit to exactly one of several channel
//! operations.
//!
//! Selection runs in two phases. The non-blocking phase walks the arms in
//! caller order and reserves the first resource that is available right
//! now. If nothing is ready, the blocking phase obtains one pooled
//! two-phase signal and registers it with every arm's channel; the first
//! channel whose resource frees up claims the cell (`READY → CLAIMED`),
//! writes the winning arm index into its data word and notifies. The
//! claim is the unique commit point: channels that lose the race hand
//! their resource back, and cells left parked in losing queues are
//! discarded lazily when a later scan walks past them.
//!
//! Committing reserves the operation but does not perform it; the caller
//! materializes it through [`SelectedOperation::recv`] or
//! [`SelectedOperation::send`], which consume the reservation the winning
//! channel holds.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;

use oluk::pool;
use oluk::signal::MAX_PAYLOAD;
use oluk::Signal;

use crate::channel::Channel;
use crate::error::{SendError, TrySelectError};

/// Outcome of a non-blocking reservation attempt.
pub(crate) enum Reservation {
    /// Resource reserved; the channel holds it until materialization.
    Ready,
    /// Nothing available without blocking.
    WouldBlock,
    /// The channel is closed (and drained, for a receive arm).
    Closed,
}

/// Outcome of registering a selection cell with a channel.
pub(crate) enum Registration {
    /// The resource was available and this arm committed.
    Won,
    /// The resource was available but the selection had already committed
    /// elsewhere.
    Lost,
    /// The cell is parked in the channel's waiter queue.
    Parked,
    /// The channel is closed (and drained, for a receive arm).
    Closed,
}

/// Untyped face a channel shows the selection engine.
pub(crate) trait Target {
    fn reserve(&self, recv: bool) -> Reservation;
    fn register(&self, recv: bool, cell: &Arc<Signal>, arm: usize) -> Registration;
    fn target_addr(&self) -> usize;
}

impl<T> Target for Channel<T> {
    fn reserve(&self, recv: bool) -> Reservation {
        self.reserve_dir(recv)
    }

    fn register(&self, recv: bool, cell: &Arc<Signal>, arm: usize) -> Registration {
        self.register_dir(recv, cell, arm)
    }

    fn target_addr(&self) -> usize {
        self.addr()
    }
}

struct Arm<'a> {
    target: &'a dyn Target,
    recv: bool,
}

/// Builder over an ordered list of channel operations.
///
/// # Example
///
/// ```rust
/// use oluk_channel::{Channel, Select};
///
/// let c1: Channel<i32> = Channel::new(4);
/// let c2: Channel<i32> = Channel::new(4);
/// c2.send(7).unwrap();
///
/// let mut sel = Select::new();
/// sel.recv(&c1);
/// sel.recv(&c2);
/// let op = sel.select();
/// assert_eq!(op.index(), 1);
/// assert_eq!(op.recv(&c2), Some(7));
/// ```
pub struct Select<'a> {
    arms: Vec<Arm<'a>>,
}

impl<'a> Select<'a> {
    /// Creates a selection with no operations.
    pub fn new() -> Self {
        Self { arms: Vec::new() }
    }

    /// Adds a receive operation; returns its arm index.
    pub fn recv<T>(&mut self, chan: &'a Channel<T>) -> usize {
        self.arms.push(Arm {
            target: chan.as_target(),
            recv: true,
        });
        self.arms.len() - 1
    }

    /// Adds a send operation; returns its arm index. The message itself is
    /// supplied when the committed operation is materialized.
    pub fn send<T>(&mut self, chan: &'a Channel<T>) -> usize {
        self.arms.push(Arm {
            target: chan.as_target(),
            recv: false,
        });
        self.arms.len() - 1
    }

    fn operation(&self, index: usize, reserved: bool) -> SelectedOperation<'a> {
        let arm = &self.arms[index];
        SelectedOperation {
            index,
            addr: arm.target.target_addr(),
            recv: arm.recv,
            reserved,
            completed: false,
            _marker: PhantomData,
        }
    }

    /// Commits the first operation that is ready without blocking,
    /// scanning in arm order.
    ///
    /// When every arm observes closure, returns the (unreserved) operation
    /// for the first arm that did; materializing it reports the closure.
    /// Otherwise fails with [`TrySelectError`] if all arms would block.
    pub fn try_select(&mut self) -> Result<SelectedOperation<'a>, TrySelectError> {
        assert!(!self.arms.is_empty(), "selecting over no operations");
        assert!(
            self.arms.len() <= MAX_PAYLOAD,
            "too many selection operations"
        );
        let mut closed = 0;
        let mut first_closed = None;
        for (i, arm) in self.arms.iter().enumerate() {
            match arm.target.reserve(arm.recv) {
                Reservation::Ready => return Ok(self.operation(i, true)),
                Reservation::Closed => {
                    closed += 1;
                    if first_closed.is_none() {
                        first_closed = Some(i);
                    }
                }
                Reservation::WouldBlock => {}
            }
        }
        if closed == self.arms.len() {
            return Ok(self.operation(first_closed.unwrap(), false));
        }
        Err(TrySelectError)
    }

    /// Commits exactly one operation, blocking until one is ready or every
    /// arm's channel has closed.
    pub fn select(&mut self) -> SelectedOperation<'a> {
        if let Ok(op) = self.try_select() {
            return op;
        }

        let cell = pool::obtain();
        let mut parked = false;
        let mut committed = false;
        let mut first_closed = None;
        for (i, arm) in self.arms.iter().enumerate() {
            match arm.target.register(arm.recv, &cell, i) {
                Registration::Won | Registration::Lost => {
                    committed = true;
                    break;
                }
                Registration::Parked => parked = true,
                Registration::Closed => {
                    if first_closed.is_none() {
                        first_closed = Some(i);
                    }
                }
            }
        }

        if !committed && !parked {
            // Every arm observed closure before anything could park.
            cell.finish();
            pool::recycle(cell);
            let index = first_closed.expect("registration produced no outcome");
            return self.operation(index, false);
        }

        cell.wait(None);
        let index = cell.word();
        cell.finish();
        pool::recycle(cell);
        assert!(index < self.arms.len(), "selection committed out of range");
        self.operation(index, true)
    }
}

impl<'a> Default for Select<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// A committed selection awaiting materialization.
///
/// Must be completed with [`recv`](Self::recv) or [`send`](Self::send)
/// against the channel of the winning arm; dropping it uncompleted is a
/// bug and panics, as the winning channel still holds a reservation.
pub struct SelectedOperation<'a> {
    index: usize,
    addr: usize,
    recv: bool,
    reserved: bool,
    completed: bool,
    _marker: PhantomData<&'a ()>,
}

impl<'a> SelectedOperation<'a> {
    /// Index of the winning arm, in registration order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Materializes a committed receive: dequeues the reserved message, or
    /// returns `None` when the commit was closure.
    pub fn recv<T>(mut self, chan: &Channel<T>) -> Option<T> {
        assert_eq!(
            self.addr,
            chan.addr(),
            "selection completed against the wrong channel"
        );
        assert!(self.recv, "selected operation is a send");
        self.completed = true;
        if !self.reserved {
            return None;
        }
        chan.take_reserved()
    }

    /// Materializes a committed send: delivers `value` through the
    /// reservation, or hands it back if the commit was closure.
    pub fn send<T>(mut self, chan: &Channel<T>, value: T) -> Result<(), SendError<T>> {
        assert_eq!(
            self.addr,
            chan.addr(),
            "selection completed against the wrong channel"
        );
        assert!(!self.recv, "selected operation is a receive");
        self.completed = true;
        if !self.reserved {
            return Err(SendError(value));
        }
        chan.place_reserved(value)
    }
}

impl Drop for SelectedOperation<'_> {
    fn drop(&mut self) {
        if !self.completed && !thread::panicking() {
            panic!("selected operation dropped without materializing");
        }
    }
}

/// Waits on multiple receive operations.
///
/// Each arm binds the `Option<T>` a completed receive produces: `Some`
/// carries the message, `None` reports that the arm's channel closed.
///
/// # Examples
///
/// ```
/// use oluk_channel::{channel, select};
///
/// let (s1, r1) = channel::<i32>(4);
/// let (_s2, r2) = channel::<i32>(4);
///
/// s1.send(10).unwrap();
///
/// select! {
///     v1 = r1 => assert_eq!(v1, Some(10)),
///     _v2 = r2 => panic!("should receive from r1"),
/// }
/// ```
///
/// With default case:
///
/// ```
/// use oluk_channel::{channel, select};
///
/// let (_s1, r1) = channel::<i32>(4);
///
/// select! {
///     _v1 = r1 => panic!("should not receive");
///     default => println!("no message available"),
/// };
/// ```
#[macro_export]
macro_rules! select {
    // Case with default
    (
        $($name:pat = $rx:expr => $body:expr),* ;
        default => $default_body:expr $(,)?
    ) => {
        {
            let mut __sel = $crate::Select::new();
            $(
                let _ = __sel.recv($rx.as_channel());
            )*
            match __sel.try_select() {
                Ok(__op) => {
                    let mut __op = Some(__op);
                    let mut __arm = 0usize;
                    loop {
                        $(
                            if __op.as_ref().map(|o| o.index()) == Some(__arm) {
                                let $name = __op.take().unwrap().recv($rx.as_channel());
                                #[allow(unreachable_code)]
                                break $body;
                            }
                            __arm += 1;
                        )*
                        unreachable!("selection committed to an unknown arm");
                    }
                }
                Err(_) => $default_body,
            }
        }
    };
    // Case without default
    (
        $($name:pat = $rx:expr => $body:expr),* $(,)?
    ) => {
        {
            let mut __sel = $crate::Select::new();
            $(
                let _ = __sel.recv($rx.as_channel());
            )*
            let __op = __sel.select();
            let mut __op = Some(__op);
            let mut __arm = 0usize;
            loop {
                $(
                    if __op.as_ref().map(|o| o.index()) == Some(__arm) {
                        let $name = __op.take().unwrap().recv($rx.as_channel());
                        #[allow(unreachable_code)]
                        break $body;
                    }
                    __arm += 1;
                )*
                unreachable!("selection committed to an unknown arm");
            }
        }
    };
}
