//! Blocking CSP channels over OS threads.
//!
//! This crate provides typed, in-process communication channels in the
//! CSP style: producers send values, consumers receive them, with
//! blocking, buffering, explicit closure, and multi-way selection. It is
//! built on the parking and pooling primitives of the
//! [`oluk`](https://crates.io/crates/oluk) crate.
//!
//! # Key Features
//!
//! - **Three capacities, one type**: capacity `0` is a rendezvous channel,
//!   `1` a single buffered slot, anything larger a fixed-capacity ring.
//! - **Multi-producer multi-consumer**: every operation takes `&self`; the
//!   [`channel`] endpoints clone freely.
//! - **Closure semantics**: `close()` is sticky and idempotent, wakes all
//!   waiters, and leaves buffered messages drainable.
//! - **Selection**: the [`Select`] builder (and the [`select!`] macro)
//!   commits exactly one of several pending operations, with an optional
//!   non-blocking default.
//! - **Timed operations**: `send_timeout`/`recv_timeout` on every flavor.
//!
//! # Example
//!
//! ```rust
//! use std::thread;
//! use oluk_channel::channel;
//!
//! let (tx, rx) = channel::<i32>(0);
//!
//! thread::spawn(move || {
//!     tx.send(42).unwrap();
//! });
//!
//! assert_eq!(rx.recv(), Some(42));
//! ```
//!
//! # Safety
//!
//! The implementation uses `unsafe` internally for value handoff slots and
//! pooled queue nodes, but exposes a safe API. Exclusive access to each
//! slot is guaranteed by the claim protocol of the underlying two-phase
//! signals.

#![warn(missing_docs)]

/// Channel façade and endpoint pairs.
pub mod channel;
/// Error types for channel and selection operations.
pub mod error;
/// Channel implementations (rendezvous, single slot, ring).
mod flavors;
/// Selection engine and the `select!` macro.
pub mod select;
/// Counting semaphore used by the buffered flavors.
mod sem;

pub use channel::{channel, Channel, Receiver, Sender};
pub use error::{
    RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySelectError, TrySendError,
};
pub use select::{Select, SelectedOperation};
