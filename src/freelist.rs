//! Pooled queue nodes.
//!
//! [`NodePool`] is a concurrent LIFO of free nodes shared by any number of
//! [`LinkQueue`]s, so that parking a waiter does not allocate once the pool
//! is warm. The pop side detaches the whole stack with a `swap` and pushes
//! the remainder back as a chain, which closes the classic ABA window of a
//! CAS-popped Treiber stack without any reclamation machinery: nodes are
//! only ever freed when the pool itself is dropped.
//!
//! A node is strictly owned by at most one of {pool, queue} at any time.

use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// One pooled cell: an intrusive link plus storage for one `T`.
pub struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: MaybeUninit<T>,
}

impl<T> Node<T> {
    fn vacant() -> *mut Self {
        Box::into_raw(Box::new(Self {
            next: AtomicPtr::new(ptr::null_mut()),
            value: MaybeUninit::uninit(),
        }))
    }
}

/// Concurrent LIFO cache of free nodes.
pub struct NodePool<T> {
    head: AtomicPtr<Node<T>>,
}

unsafe impl<T: Send> Send for NodePool<T> {}
unsafe impl<T: Send> Sync for NodePool<T> {}

impl<T> NodePool<T> {
    /// Creates an empty pool.
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Takes one free node, allocating if the cache is empty.
    ///
    /// The returned node's value storage is vacant.
    pub fn take(&self) -> *mut Node<T> {
        let head = self.head.swap(ptr::null_mut(), Ordering::AcqRel);
        if head.is_null() {
            return Node::vacant();
        }
        let rest = unsafe { (*head).next.load(Ordering::Relaxed) };
        if !rest.is_null() {
            self.put_chain(rest);
        }
        head
    }

    /// Returns a node whose value storage has been vacated.
    pub fn put(&self, node: *mut Node<T>) {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            unsafe { (*node).next.store(head, Ordering::Relaxed) };
            match self.head.compare_exchange_weak(
                head,
                node,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(cur) => head = cur,
            }
        }
    }

    fn put_chain(&self, chain: *mut Node<T>) {
        let mut tail = chain;
        unsafe {
            loop {
                let next = (*tail).next.load(Ordering::Relaxed);
                if next.is_null() {
                    break;
                }
                tail = next;
            }
        }
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            unsafe { (*tail).next.store(head, Ordering::Relaxed) };
            match self.head.compare_exchange_weak(
                head,
                chain,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(cur) => head = cur,
            }
        }
    }
}

impl<T> Default for NodePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for NodePool<T> {
    fn drop(&mut self) {
        // Free nodes carry no live value.
        let mut node = *self.head.get_mut();
        while !node.is_null() {
            let next = unsafe { (*node).next.load(Ordering::Relaxed) };
            drop(unsafe { Box::from_raw(node) });
            node = next;
        }
    }
}

/// FIFO list over pooled nodes.
///
/// Not synchronized; meant to live under the owner's mutex or spinlock.
/// On drop, remaining values are dropped and their nodes returned.
pub struct LinkQueue<T: 'static> {
    head: *mut Node<T>,
    tail: *mut Node<T>,
    len: usize,
    pool: &'static NodePool<T>,
}

unsafe impl<T: Send + 'static> Send for LinkQueue<T> {}

impl<T: 'static> LinkQueue<T> {
    /// Creates an empty queue drawing nodes from `pool`.
    pub fn new(pool: &'static NodePool<T>) -> Self {
        Self {
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
            len: 0,
            pool,
        }
    }

    /// Appends `value`.
    pub fn push_back(&mut self, value: T) {
        let node = self.pool.take();
        unsafe {
            (*node).value = MaybeUninit::new(value);
            (*node).next.store(ptr::null_mut(), Ordering::Relaxed);
        }
        if self.tail.is_null() {
            self.head = node;
        } else {
            unsafe { (*self.tail).next.store(node, Ordering::Relaxed) };
        }
        self.tail = node;
        self.len += 1;
    }

    /// Removes and returns the oldest value.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.head.is_null() {
            return None;
        }
        let node = self.head;
        self.head = unsafe { (*node).next.load(Ordering::Relaxed) };
        if self.head.is_null() {
            self.tail = ptr::null_mut();
        }
        let value = unsafe { (*node).value.as_ptr().read() };
        self.pool.put(node);
        self.len -= 1;
        Some(value)
    }

    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the queue holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: 'static> Drop for LinkQueue<T> {
    fn drop(&mut self) {
        while self.pop_front().is_some() {}
    }
}
