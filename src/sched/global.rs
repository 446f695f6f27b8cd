// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Global scheduler instance
//!
//! The kernel has one scheduler, initialized once at boot and never torn
//! down. Every entry point below masks interrupts for the duration of the
//! call through [`IrqMutex`].
//!
//! A context switch happens inside an entry point, so the lock is released
//! for the duration of [`ContextSwitch::switch`]: the thread switched to
//! either starts fresh and takes the lock on its first call, or resumes
//! inside its own switch and re-acquires it there.

use alloc::string::String;

use spin::Once;

use super::scheduler::Scheduler;
use super::thread::ThreadFn;
use crate::arch::{ContextSwitch, SavedContext, HOSTED_SWITCH};
use crate::config::{SchedConfig, Tid, TID_ERROR};
use crate::error::Result;
use crate::sync::IrqMutex;

/// Global scheduler instance
static SCHEDULER: Once<IrqMutex<Scheduler>> = Once::new();

/// Architecture switch wrapped by [`LockedSwitch`]
static ARCH_SWITCH: Once<&'static dyn ContextSwitch> = Once::new();

/// Switch that passes the global scheduler lock to the next thread
struct LockedSwitch;

static LOCKED_SWITCH: LockedSwitch = LockedSwitch;

impl ContextSwitch for LockedSwitch {
    unsafe fn switch(&self, prev: *mut SavedContext, next: *const SavedContext) {
        let arch: &'static dyn ContextSwitch = match ARCH_SWITCH.get() {
            Some(&arch) => arch,
            None => &HOSTED_SWITCH,
        };
        let scheduler = match SCHEDULER.get() {
            Some(scheduler) => scheduler,
            // SAFETY: forwarded from the caller
            None => return unsafe { arch.switch(prev, next) },
        };

        // SAFETY: the switch runs inside `with`, whose guard holds the lock
        // and is not touched again until `relock` below. Interrupts stay
        // masked, so nothing else runs on this core in between.
        unsafe {
            scheduler.force_unlock();
            arch.switch(prev, next);
        }
        scheduler.relock();
    }
}

/// Initialize the scheduler, turning the boot context into `main`
///
/// Later calls are ignored.
pub fn init(config: SchedConfig) {
    init_with_switch(config, &HOSTED_SWITCH);
}

/// Initialize the scheduler with an architecture context switch
///
/// A thread's first switch enters its entry with interrupts masked and the
/// scheduler lock free; the architecture trampoline enables interrupts
/// before calling the entry.
pub fn init_with_switch(config: SchedConfig, switcher: &'static dyn ContextSwitch) {
    ARCH_SWITCH.call_once(|| switcher);
    SCHEDULER.call_once(|| IrqMutex::new(Scheduler::with_switch(config, &LOCKED_SWITCH)));
}

/// Check whether the scheduler has been initialized
pub fn is_initialized() -> bool {
    SCHEDULER.get().is_some()
}

/// Run `f` on the global scheduler with interrupts masked
///
/// # Panics
///
/// Panics if [`init`] has not been called.
pub fn with<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    let scheduler = match SCHEDULER.get() {
        Some(scheduler) => scheduler,
        None => panic!("scheduler not initialized"),
    };
    let mut guard = scheduler.lock();
    f(&mut *guard)
}

/// Run `f` on the global scheduler unless the lock is taken
///
/// Returns `None` before [`init`] or while another call is in progress.
pub fn try_with<R>(f: impl FnOnce(&mut Scheduler) -> R) -> Option<R> {
    let mut guard = SCHEDULER.get()?.try_lock()?;
    Some(f(&mut *guard))
}

/// Create the idle thread
pub fn start() {
    with(|s| s.start());
}

/// Timer interrupt hook
pub fn tick() {
    with(|s| s.timer_interrupt());
}

/// Create a thread, returning its tid or `TID_ERROR`
pub fn create(name: &str, priority: i32, entry: ThreadFn, arg: usize) -> Tid {
    with(|s| s.create(name, priority, entry, arg)).unwrap_or(TID_ERROR)
}

/// Block the running thread
pub fn block() {
    with(|s| s.block());
}

/// Make a blocked thread ready
pub fn unblock(tid: Tid) -> Result<()> {
    with(|s| s.unblock(tid))
}

/// Terminate the running thread
pub fn exit(status: i32) {
    with(|s| s.exit(status));
}

/// Tid of the running thread
pub fn current_tid() -> Tid {
    with(|s| s.tid())
}

/// Name of the running thread
pub fn current_name() -> String {
    with(|s| String::from(s.name()))
}

/// Yield the CPU
pub fn yield_now() {
    with(|s| s.yield_current());
}

/// Yield if a higher-priority thread is ready
pub fn compare_and_preempt() -> bool {
    with(|s| s.compare_and_preempt())
}

/// Sleep until the given tick
pub fn sleep_until(deadline: i64) {
    with(|s| s.sleep_until(deadline));
}

/// Sleep for the given number of ticks
pub fn sleep_for(ticks: i64) {
    with(|s| s.sleep_for(ticks));
}

/// Wake due sleepers
pub fn wake(now: i64) -> usize {
    with(|s| s.wake(now))
}

/// Timer ticks since boot
pub fn ticks() -> i64 {
    with(|s| s.ticks())
}

/// Effective priority of the running thread
pub fn get_priority() -> i32 {
    with(|s| s.get_priority())
}

/// Set the running thread's base priority
pub fn set_priority(priority: i32) -> Result<()> {
    with(|s| s.set_priority(priority))
}

/// Niceness of the running thread
pub fn get_nice() -> i32 {
    with(|s| s.get_nice())
}

/// Set the running thread's niceness
pub fn set_nice(nice: i32) {
    with(|s| s.set_nice(nice));
}

/// 100 times the running thread's recent CPU
pub fn get_recent_cpu() -> i32 {
    with(|s| s.get_recent_cpu())
}

/// 100 times the load average
pub fn get_load_avg() -> i32 {
    with(|s| s.get_load_avg())
}

/// Log scheduling statistics
pub fn print_stats() {
    with(|s| s.print_stats());
}
