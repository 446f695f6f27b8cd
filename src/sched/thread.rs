// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread control block
//!
//! Defines the Thread struct and related types. Fields are only mutated by
//! the scheduler; everything outside the crate sees read-only accessors.

use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;

use super::fixed_point::Fixed;
use super::state::{Queue, ThreadStatus};
use crate::arch::SavedContext;
use crate::config::{Tid, NAME_MAX, NICE_DEFAULT, THREAD_MAGIC};
use crate::process::fd::{FileHandle, FileTable};
use crate::sync::{LockId, Rendezvous};

/// Function entry point type
pub type ThreadFn = fn(usize);

bitflags! {
    /// Thread attributes fixed at creation
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadFlags: u32 {
        /// The idle thread
        const IDLE = 1 << 0;
        /// The boot thread
        const MAIN = 1 << 1;
        /// Runs a user process (ticks are accounted as user time)
        const USER = 1 << 2;
    }
}

/// Thread structure
///
/// Represents a thread of execution in the kernel.
#[derive(Debug)]
pub struct Thread {
    /// Unique thread ID
    pub(crate) tid: Tid,
    /// Display name, at most `NAME_MAX` bytes
    pub(crate) name: String,
    /// Thread status
    pub(crate) status: ThreadStatus,
    /// Queue currently owning this thread
    pub(crate) queue: Queue,
    /// Attributes
    pub(crate) flags: ThreadFlags,

    /// Priority before donation
    pub(crate) base_priority: i32,
    /// Priority used for scheduling decisions
    pub(crate) priority: i32,
    /// MLFQS niceness
    pub(crate) nice: i32,
    /// MLFQS recent CPU usage
    pub(crate) recent_cpu: Fixed,
    /// Ticks consumed in the current quantum
    pub(crate) slice_ticks: u32,

    /// Threads waiting on a lock this thread holds
    pub(crate) donors: Vec<Tid>,
    /// Locks this thread holds
    pub(crate) held_locks: Vec<LockId>,

    /// Tracked parent, a lookup relation only
    pub(crate) parent: Option<Tid>,
    /// Children not yet reaped
    pub(crate) children: Vec<Tid>,
    /// Released once the child's initial setup completes
    pub(crate) fork_signal: Rendezvous,
    /// Released once the exit status is published
    pub(crate) exit_signal: Rendezvous,
    /// Released at exit to wake a parent blocked in `wait`
    pub(crate) wait_signal: Rendezvous,
    /// Status passed to `exit`
    pub(crate) exit_status: i32,
    /// Result delivered to this thread while it was parked
    pub(crate) syscall_ret: Option<i32>,

    /// Open files
    pub(crate) files: FileTable,
    /// File backing the running program
    pub(crate) running_file: Option<FileHandle>,
    /// Address-space metadata
    #[cfg(feature = "vm")]
    pub(crate) address_space: Option<crate::process::AddressSpace>,

    /// Saved registers
    pub(crate) context: SavedContext,
    /// Guard value checked whenever the running thread is queried
    pub(crate) magic: u32,
}

impl Thread {
    /// Create a new thread in the blocked state
    pub(crate) fn new(tid: Tid, name: &str, priority: i32, context: SavedContext) -> Self {
        Self {
            tid,
            name: truncate_name(name),
            status: ThreadStatus::Blocked,
            queue: Queue::None,
            flags: ThreadFlags::empty(),
            base_priority: priority,
            priority,
            nice: NICE_DEFAULT,
            recent_cpu: Fixed::ZERO,
            slice_ticks: 0,
            donors: Vec::new(),
            held_locks: Vec::new(),
            parent: None,
            children: Vec::new(),
            fork_signal: Rendezvous::new(),
            exit_signal: Rendezvous::new(),
            wait_signal: Rendezvous::new(),
            exit_status: 0,
            syscall_ret: None,
            files: FileTable::new(),
            running_file: None,
            #[cfg(feature = "vm")]
            address_space: None,
            context,
            magic: THREAD_MAGIC,
        }
    }

    /// Thread ID
    pub fn tid(&self) -> Tid {
        self.tid
    }

    /// Thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Thread status
    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    /// Queue currently owning this thread
    pub fn queue(&self) -> Queue {
        self.queue
    }

    /// Thread attributes
    pub fn flags(&self) -> ThreadFlags {
        self.flags
    }

    /// Check if this is the idle thread
    pub fn is_idle(&self) -> bool {
        self.flags.contains(ThreadFlags::IDLE)
    }

    /// Effective priority
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Priority before donation
    pub fn base_priority(&self) -> i32 {
        self.base_priority
    }

    /// Niceness
    pub fn nice(&self) -> i32 {
        self.nice
    }

    /// Recent CPU usage
    pub fn recent_cpu(&self) -> Fixed {
        self.recent_cpu
    }

    /// Threads currently donating to this one
    pub fn donors(&self) -> &[Tid] {
        &self.donors
    }

    /// Locks held by this thread
    pub fn held_locks(&self) -> &[LockId] {
        &self.held_locks
    }

    /// Lock this thread is waiting to acquire
    pub fn wait_on_lock(&self) -> Option<LockId> {
        match self.queue {
            Queue::Lock(lock) => Some(lock),
            _ => None,
        }
    }

    /// Wake-up tick, meaningful only while sleeping
    pub fn wakeup_deadline(&self) -> Option<i64> {
        match self.queue {
            Queue::Sleeping { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Tracked parent
    pub fn parent(&self) -> Option<Tid> {
        self.parent
    }

    /// Children not yet reaped
    pub fn children(&self) -> &[Tid] {
        &self.children
    }

    /// Exit status (valid once the thread is dying)
    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// Open files
    pub fn files(&self) -> &FileTable {
        &self.files
    }

    /// File backing the running program
    pub fn running_file(&self) -> Option<FileHandle> {
        self.running_file
    }

    /// Check the stack guard
    pub fn is_intact(&self) -> bool {
        self.magic == THREAD_MAGIC
    }
}

/// Truncate a name to at most `NAME_MAX` bytes on a char boundary
fn truncate_name(name: &str) -> String {
    let mut end = name.len().min(NAME_MAX);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    String::from(&name[..end])
}

/// Idle thread body
///
/// Runs only when no other thread is ready.
pub fn idle_entry(_arg: usize) {
    loop {
        core::hint::spin_loop();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PRI_DEFAULT;

    #[test]
    fn test_thread_new() {
        let thread = Thread::new(5, "worker", PRI_DEFAULT, SavedContext::empty());

        assert_eq!(thread.tid(), 5);
        assert_eq!(thread.name(), "worker");
        assert_eq!(thread.status(), ThreadStatus::Blocked);
        assert_eq!(thread.priority(), PRI_DEFAULT);
        assert_eq!(thread.base_priority(), PRI_DEFAULT);
        assert_eq!(thread.wait_on_lock(), None);
        assert_eq!(thread.wakeup_deadline(), None);
        assert!(thread.is_intact());
        assert!(!thread.is_idle());
    }

    #[test]
    fn test_name_truncated() {
        let thread = Thread::new(1, "a-very-long-thread-name", 0, SavedContext::empty());
        assert_eq!(thread.name(), "a-very-long-thr");
        assert_eq!(thread.name().len(), NAME_MAX);

        // Never split a multi-byte character
        let thread = Thread::new(2, "aaaaaaaaaaaaaa\u{e9}", 0, SavedContext::empty());
        assert_eq!(thread.name(), "aaaaaaaaaaaaaa");
    }

    #[test]
    fn test_queue_derived_fields() {
        let mut thread = Thread::new(3, "t", 0, SavedContext::empty());

        thread.queue = Queue::Sleeping { deadline: 42 };
        assert_eq!(thread.wakeup_deadline(), Some(42));
        assert_eq!(thread.wait_on_lock(), None);
    }
}
