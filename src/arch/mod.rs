// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Architecture boundary
//!
//! The scheduler core touches the machine in exactly two places:
//!
//! - **Interrupt masking**: the only mutual-exclusion mechanism on the
//!   single logical core. On bare-metal x86_64 this is `cli`/`sti` through
//!   the `x86_64` crate; hosted builds simulate the interrupt flag.
//! - **Context switch**: saving the running thread's registers and jumping
//!   to the next thread's. The core stores the [`SavedContext`] payload and
//!   hands it to a [`ContextSwitch`] implementation without inspecting it.

use crate::sched::thread::ThreadFn;

/// ============================================================================
/// Interrupt masking
/// ============================================================================

pub mod interrupts {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    use x86_64::instructions::interrupts as hw;

    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    use core::sync::atomic::{AtomicBool, Ordering};

    /// Simulated interrupt flag for hosted builds
    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    static INTERRUPTS_ENABLED: AtomicBool = AtomicBool::new(true);

    /// Check whether interrupts are enabled
    #[inline]
    pub fn are_enabled() -> bool {
        #[cfg(all(target_arch = "x86_64", target_os = "none"))]
        {
            hw::are_enabled()
        }
        #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
        {
            INTERRUPTS_ENABLED.load(Ordering::Acquire)
        }
    }

    /// Enable interrupts
    #[inline]
    pub fn enable() {
        #[cfg(all(target_arch = "x86_64", target_os = "none"))]
        hw::enable();
        #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
        INTERRUPTS_ENABLED.store(true, Ordering::Release);
    }

    /// Disable interrupts
    #[inline]
    pub fn disable() {
        #[cfg(all(target_arch = "x86_64", target_os = "none"))]
        hw::disable();
        #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
        INTERRUPTS_ENABLED.store(false, Ordering::Release);
    }
}

/// RAII interrupt mask
///
/// Disables interrupts on creation and restores the previous level on drop,
/// so guards nest.
pub struct InterruptGuard {
    was_enabled: bool,
}

impl InterruptGuard {
    /// Mask interrupts until the guard is dropped
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let was_enabled = interrupts::are_enabled();
        if was_enabled {
            interrupts::disable();
        }
        Self { was_enabled }
    }

    /// Interrupt level in effect before this guard
    pub fn was_enabled(&self) -> bool {
        self.was_enabled
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if self.was_enabled {
            interrupts::enable();
        }
    }
}

/// ============================================================================
/// Context switch
/// ============================================================================

/// Saved register state of a thread that is not running
///
/// Opaque to the scheduler: it is built once when the thread is created
/// and otherwise only passed to [`ContextSwitch::switch`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SavedContext {
    regs: [u64; 24],
}

impl SavedContext {
    /// Register state of a context that has never run
    pub const fn empty() -> Self {
        Self { regs: [0; 24] }
    }

    /// Register state that starts `entry(arg)` on first switch
    pub fn for_entry(entry: ThreadFn, arg: usize) -> Self {
        let mut context = Self::empty();
        context.regs[0] = entry as usize as u64;
        context.regs[1] = arg as u64;
        context
    }
}

impl Default for SavedContext {
    fn default() -> Self {
        Self::empty()
    }
}

/// Register save/restore primitive supplied by the architecture layer
pub trait ContextSwitch: Sync {
    /// Save the running context into `prev` and resume `next`
    ///
    /// Returns when the thread owning `prev` is scheduled again. A thread
    /// that has never run starts at its entry instead, with interrupts
    /// still masked. The global scheduler's lock is free for the whole
    /// call, so the next thread can enter the scheduler.
    ///
    /// # Safety
    ///
    /// Both pointers must reference live TCB contexts and interrupts must be
    /// masked.
    unsafe fn switch(&self, prev: *mut SavedContext, next: *const SavedContext);
}

/// Context switch for hosted builds
///
/// The scheduler runs as a pure state machine: switching only changes which
/// thread subsequent calls act on behalf of.
pub struct HostedSwitch;

impl ContextSwitch for HostedSwitch {
    unsafe fn switch(&self, _prev: *mut SavedContext, _next: *const SavedContext) {}
}

/// Shared instance of [`HostedSwitch`]
pub static HOSTED_SWITCH: HostedSwitch = HostedSwitch;

// ============================================================================
// Tests
// ============================================================================
