// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Interrupt-masking mutex
//!
//! On the single logical core, masking interrupts is what actually excludes
//! other kernel code; the spin lock only catches re-entrant use. The guard
//! releases the spin lock before it restores the interrupt level.

use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use crate::arch::InterruptGuard;

/// Mutex whose critical sections run with interrupts masked
pub struct IrqMutex<T> {
    inner: spin::Mutex<T>,
}

/// RAII guard for an [`IrqMutex`]
pub struct IrqMutexGuard<'a, T> {
    // Dropped first, then the interrupt level is restored
    guard: ManuallyDrop<spin::MutexGuard<'a, T>>,
    _irq: InterruptGuard,
}

impl<T> IrqMutex<T> {
    /// Create a new mutex
    pub const fn new(data: T) -> Self {
        Self {
            inner: spin::Mutex::new(data),
        }
    }

    /// Mask interrupts and acquire the lock
    pub fn lock(&self) -> IrqMutexGuard<'_, T> {
        let irq = InterruptGuard::new();
        let guard = self.inner.lock();
        IrqMutexGuard {
            guard: ManuallyDrop::new(guard),
            _irq: irq,
        }
    }

    /// Try to acquire the lock without spinning
    pub fn try_lock(&self) -> Option<IrqMutexGuard<'_, T>> {
        let irq = InterruptGuard::new();
        self.inner.try_lock().map(|guard| IrqMutexGuard {
            guard: ManuallyDrop::new(guard),
            _irq: irq,
        })
    }

    /// Check if the mutex is currently locked
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Release the lock while its guard is still alive
    ///
    /// # Safety
    ///
    /// The lock must be held, and [`relock`](Self::relock) must be called
    /// before the outstanding guard is used or dropped.
    pub unsafe fn force_unlock(&self) {
        // SAFETY: upheld by the caller
        unsafe { self.inner.force_unlock() };
    }

    /// Re-acquire a lock released by [`force_unlock`](Self::force_unlock)
    ///
    /// The outstanding guard owns the lock again once this returns.
    pub fn relock(&self) {
        core::mem::forget(self.inner.lock());
    }
}

impl<T> Deref for IrqMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for IrqMutexGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: dropped exactly once, here, and never used afterwards
        unsafe { ManuallyDrop::drop(&mut self.guard) };
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::interrupts;

    // The hosted interrupt flag is process-wide, so every check that reads it
    // lives in this one test.
    #[test]
    fn test_lock_masks_interrupts() {
        interrupts::enable();

        {
            let outer = InterruptGuard::new();
            assert!(outer.was_enabled());
            assert!(!interrupts::are_enabled());
            {
                let inner = InterruptGuard::new();
                assert!(!inner.was_enabled());
            }
            assert!(!interrupts::are_enabled());
        }
        assert!(interrupts::are_enabled());

        let mutex = IrqMutex::new(42);
        {
            let mut guard = mutex.lock();
            assert!(!interrupts::are_enabled());
            assert!(mutex.is_locked());
            assert!(mutex.try_lock().is_none());
            *guard = 100;
        }
        assert!(interrupts::are_enabled());
        assert!(!mutex.is_locked());
        assert_eq!(*mutex.lock(), 100);

        // Handing the lock over while a guard is outstanding
        {
            let mut guard = mutex.lock();
            unsafe { mutex.force_unlock() };
            assert!(!mutex.is_locked());
            assert!(!interrupts::are_enabled());
            {
                let mut other = mutex.try_lock().unwrap();
                *other = 7;
            }
            mutex.relock();
            assert!(mutex.is_locked());
            *guard += 1;
        }
        assert!(interrupts::are_enabled());
        assert!(!mutex.is_locked());
        assert_eq!(*mutex.lock(), 8);
    }
}
