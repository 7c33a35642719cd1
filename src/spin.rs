//! TTAS (Test-Test-And-Set) spinlock.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A TTAS spinlock wrapping `data`.
///
/// Intended for critical sections that are O(1): cursor updates, slot
/// initialization, waiter dequeues. Never hold one across a park.
pub struct Spinlock<T: ?Sized> {
    acquired: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    /// Create a new spinlock wrapping `data`.
    pub const fn new(data: T) -> Self {
        Self {
            acquired: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }
}

impl<T: ?Sized> Spinlock<T> {
    /// Acquire the lock.
    #[inline]
    pub fn lock(&self) -> SpinGuard<'_, T> {
        loop {
            // Test phase: spin on relaxed load (stays in cache)
            while self.acquired.load(Ordering::Relaxed) {
                spin_loop();
            }
            // Test-and-set phase: attempt to acquire
            if !self.acquired.swap(true, Ordering::Acquire) {
                return SpinGuard { lock: self };
            }
        }
    }
}

/// RAII guard for the spinlock. Releases the lock on drop.
pub struct SpinGuard<'a, T: ?Sized> {
    lock: &'a Spinlock<T>,
}

impl<T: ?Sized> Deref for SpinGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.acquired.store(false, Ordering::Release);
    }
}
