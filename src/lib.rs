//! Oluk: low-level synchronization toolkit for blocking concurrency.
//!
//! This crate provides the parking and pooling primitives that the
//! `oluk-channel` crate builds its channels on. Everything here blocks on
//! OS threads; there is no cooperative scheduler and no implicit yield.
//!
//! # Key Pieces
//!
//! - **Two-Phase Signal**: A single-use wake token whose `READY → CLAIMED`
//!   transition arbitrates races between multiple would-be wakers.
//! - **Signal Pool**: Process-wide cache of idle signals with a uniqueness
//!   check, so parking does not allocate on the hot path.
//! - **Node Pool**: Concurrent free-list of queue nodes backing FIFO waiter
//!   queues.
//! - **Spinlock**: TTAS lock with an RAII guard for O(1) critical sections.
//!
//! # Example
//!
//! ```rust
//! use std::thread;
//! use oluk::pool;
//! use oluk::signal::TAG_XFER;
//!
//! let cell = pool::obtain();
//! let peer = cell.clone();
//!
//! let t = thread::spawn(move || {
//!     if peer.claim() {
//!         peer.set_word(TAG_XFER);
//!         peer.finish();
//!         peer.notify();
//!     }
//! });
//!
//! assert!(cell.wait(None));
//! assert_eq!(cell.word(), TAG_XFER);
//! t.join().unwrap();
//! pool::recycle(cell);
//! ```

#![warn(missing_docs)]

/// Pooled queue nodes and the FIFO list built over them.
pub mod freelist;
/// Process-wide cache of idle signal cells.
pub mod pool;
/// Two-phase counted signal.
pub mod signal;
/// TTAS spinlock.
pub mod spin;

pub use signal::Signal;
pub use spin::Spinlock;
