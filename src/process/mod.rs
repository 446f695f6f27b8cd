// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Process hierarchy
//!
//! Every thread created by a non-idle thread is tracked as a child of its
//! creator. Three rendezvous signals per thread sequence the lifecycle:
//!
//! - **fork-load**: the child reports that its setup finished; the parent
//!   is parked on it for the whole of `fork`
//! - **exit**: latched once the exit status is published
//! - **wait**: wakes a parent blocked in `wait` on this child
//!
//! # Lifecycle
//!
//! ```text
//! Blocked -> Ready <-> Running -> Dying -> (reaped)
//! ```
//!
//! A dying thread with a tracked parent stays a zombie until the parent's
//! `wait` consumes its status. Untracked threads are reclaimed at the next
//! scheduling decision.

pub mod fd;

use log::debug;

use crate::config::{Tid, TID_ERROR};
use crate::error::Result;
use crate::sched::scheduler::Scheduler;
use crate::sched::state::{Outcome, Queue, SignalKind, ThreadStatus};
use crate::sched::thread::{Thread, ThreadFlags};

pub use fd::{FileHandle, FileTable};

/// Opaque address-space metadata owned by a thread
#[cfg(feature = "vm")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace(pub u64);

impl Scheduler {
    /// ========================================================================
    /// Fork / wait / exit
    /// ========================================================================

    /// Create a child process and wait for it to finish loading
    ///
    /// The child inherits the caller's base priority, saved context and
    /// open files. The caller is parked until the child calls
    /// [`fork_complete`](Self::fork_complete); its syscall-return slot then
    /// holds the child's tid, or `TID_ERROR` if the child failed.
    ///
    /// # Returns
    ///
    /// The child's tid, or `TooManyThreads`.
    pub fn fork(&mut self, name: &str) -> Result<Tid> {
        let cur = self.current;
        assert!(Some(cur) != self.idle, "idle thread cannot fork");

        let parent = self.tcb(cur);
        let (priority, context) = (parent.base_priority, parent.context);
        let (files, running_file) = (parent.files.clone(), parent.running_file);

        let child = self.spawn(name, priority, context)?;
        let thread = self.tcb_mut(child);
        thread.flags |= ThreadFlags::USER;
        thread.files = files;
        thread.running_file = running_file;
        thread.fork_signal.park(cur);

        debug!("sched: thread {} forked child {}", cur, child);
        self.park_current(Queue::Signal {
            owner: child,
            kind: SignalKind::ForkLoad,
        });
        Ok(child)
    }

    /// Report the outcome of a forked child's setup to its parent
    ///
    /// On failure the child detaches from its parent and exits with -1.
    pub fn fork_complete(&mut self, ok: bool) {
        let cur = self.current;

        if let Some(parent) = self.tcb_mut(cur).fork_signal.signal() {
            let thread = self.tcb_mut(parent);
            thread.syscall_ret = Some(if ok { cur } else { TID_ERROR });
            thread.queue = Queue::None;
            self.make_ready(parent);
        }

        if ok {
            self.compare_and_preempt();
            return;
        }

        if let Some(parent) = self.tcb_mut(cur).parent.take() {
            self.tcb_mut(parent).children.retain(|&child| child != cur);
        }
        self.exit(-1);
    }

    /// Wait for a child to exit and reap it
    ///
    /// # Returns
    ///
    /// - `None` if `tid` is not an unreaped child of the caller
    /// - `Some(Done(status))` if the child had already exited
    /// - `Some(Blocked)` otherwise; the status is delivered to the
    ///   syscall-return slot when the child exits
    pub fn wait(&mut self, tid: Tid) -> Option<Outcome<i32>> {
        let cur = self.current;
        self.find_child(tid)?;

        if self.tcb_mut(tid).wait_signal.try_consume() {
            return Some(Outcome::Done(self.reap_child(cur, tid)));
        }

        self.tcb_mut(tid).wait_signal.park(cur);
        self.park_current(Queue::Signal {
            owner: tid,
            kind: SignalKind::Wait,
        });
        Some(Outcome::Blocked)
    }

    /// Terminate the running thread
    ///
    /// Held locks are handed to their waiters, open files are closed, live
    /// children are orphaned and zombie children reclaimed. The status goes
    /// to a parent blocked in `wait`, or waits for one. The call switches
    /// away for good: later calls run as another thread.
    pub fn exit(&mut self, status: i32) {
        assert!(!self.in_interrupt, "exit in interrupt context");
        let cur = self.current;
        assert!(Some(cur) != self.idle, "idle thread cannot exit");

        while let Some(&lock) = self.tcb(cur).held_locks.last() {
            self.hand_off_lock(cur, lock);
        }

        // A parent still parked in fork sees the child fail and loses it,
        // as after `fork_complete(false)`
        if let Some(forker) = self.tcb_mut(cur).fork_signal.signal() {
            let thread = self.tcb_mut(forker);
            thread.syscall_ret = Some(TID_ERROR);
            thread.queue = Queue::None;
            thread.children.retain(|&child| child != cur);
            self.tcb_mut(cur).parent = None;
            self.make_ready(forker);
        }

        let thread = self.tcb_mut(cur);
        debug!(
            "sched: thread {} '{}' exits with status {}",
            cur, thread.name, status
        );
        thread.exit_status = status;
        thread.files.clear();
        thread.running_file = None;
        #[cfg(feature = "vm")]
        {
            thread.address_space = None;
        }
        thread.status = ThreadStatus::Dying;
        thread.queue = Queue::None;
        let children = core::mem::take(&mut thread.children);
        let parent = thread.parent;

        for child in children {
            let child_tcb = self.tcb_mut(child);
            child_tcb.parent = None;
            if child_tcb.status == ThreadStatus::Dying {
                self.destroy(child);
            }
        }

        self.tcb_mut(cur).exit_signal.signal();
        match parent {
            Some(parent) => {
                if let Some(waiter) = self.tcb_mut(cur).wait_signal.signal() {
                    let status = self.reap_child(parent, cur);
                    let thread = self.tcb_mut(waiter);
                    thread.syscall_ret = Some(status);
                    thread.queue = Queue::None;
                    self.make_ready(waiter);
                }
            }
            None => self.defer_destroy(cur),
        }

        self.schedule();
    }

    /// Look up an unreaped child of the running thread
    ///
    /// Returns None for unknown tids, other threads' children and children
    /// already reaped.
    pub fn find_child(&self, tid: Tid) -> Option<&Thread> {
        if !self.current().children.contains(&tid) {
            return None;
        }
        self.thread(tid)
    }

    /// Detach an exited child from `parent` and return its status
    fn reap_child(&mut self, parent: Tid, child: Tid) -> i32 {
        self.tcb_mut(parent).children.retain(|&c| c != child);

        let thread = self.tcb_mut(child);
        let published = thread.exit_signal.try_consume();
        debug_assert!(published, "reaping thread {} before it exited", child);
        thread.parent = None;
        let status = thread.exit_status;

        debug!("sched: thread {} reaped child {}", parent, child);
        if child == self.current {
            self.defer_destroy(child);
        } else {
            self.destroy(child);
        }
        status
    }

    /// ========================================================================
    /// Open files
    /// ========================================================================

    /// Install an open file in the running thread's table
    pub fn fd_alloc(&mut self, handle: FileHandle) -> Option<i32> {
        let cur = self.current;
        self.tcb_mut(cur).files.alloc(handle)
    }

    /// Look up a descriptor of the running thread
    pub fn fd_get(&self, fd: i32) -> Option<FileHandle> {
        self.current().files.get(fd)
    }

    /// Close a descriptor of the running thread
    pub fn fd_close(&mut self, fd: i32) -> Option<FileHandle> {
        let cur = self.current;
        self.tcb_mut(cur).files.close(fd)
    }

    /// Record the file backing the running program
    pub fn set_running_file(&mut self, file: Option<FileHandle>) {
        let cur = self.current;
        self.tcb_mut(cur).running_file = file;
    }

    /// Attach address-space metadata to the running thread
    #[cfg(feature = "vm")]
    pub fn set_address_space(&mut self, space: AddressSpace) {
        let cur = self.current;
        self.tcb_mut(cur).address_space = Some(space);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SchedConfig, PRI_DEFAULT};
    use crate::sched::scheduler::MAIN_TID;

    fn noop(_arg: usize) {}

    fn scheduler() -> Scheduler {
        let mut sched = Scheduler::new(SchedConfig::default());
        sched.start();
        sched
    }

    #[test]
    fn test_wait_blocks_until_exit() {
        let mut sched = scheduler();
        let child = sched.create("child", PRI_DEFAULT, noop, 0).unwrap();

        assert_eq!(sched.wait(child), Some(Outcome::Blocked));
        assert_eq!(sched.tid(), child);
        sched.check_invariants();

        sched.exit(7);
        assert_eq!(sched.tid(), MAIN_TID);
        assert_eq!(sched.take_syscall_ret(), Some(7));
        assert_eq!(sched.wait(child), None);
        assert!(sched.current().children().is_empty());

        // The exited TCB goes at the next scheduling decision
        sched.yield_current();
        assert!(sched.thread(child).is_none());
        sched.check_invariants();
    }

    #[test]
    fn test_wait_on_exited_child() {
        let mut sched = scheduler();
        let child = sched.create("child", 40, noop, 0).unwrap();
        assert_eq!(sched.tid(), child);

        sched.exit(3);
        assert_eq!(sched.thread(child).unwrap().status(), ThreadStatus::Dying);

        assert_eq!(sched.wait(child), Some(Outcome::Done(3)));
        assert!(sched.thread(child).is_none());
        assert_eq!(sched.wait(child), None);
    }

    #[test]
    fn test_wait_rejects_non_children() {
        let mut sched = scheduler();
        let a = sched.create("a", PRI_DEFAULT, noop, 0).unwrap();
        let idle = sched.idle_tid().unwrap();

        assert_eq!(sched.wait(999), None);
        assert_eq!(sched.wait(idle), None);
        assert_eq!(sched.wait(MAIN_TID), None);

        sched.yield_current();
        assert_eq!(sched.tid(), a);
        // main is a's parent, not its child
        assert_eq!(sched.wait(MAIN_TID), None);
        assert!(sched.find_child(MAIN_TID).is_none());
    }

    #[test]
    fn test_fork_success() {
        let mut sched = scheduler();
        let fd = sched.fd_alloc(FileHandle(77)).unwrap();

        let child = sched.fork("child").unwrap();
        assert_eq!(sched.tid(), child);
        assert!(sched.current().flags().contains(ThreadFlags::USER));
        assert_eq!(sched.fd_get(fd), Some(FileHandle(77)));
        sched.check_invariants();

        sched.fork_complete(true);
        sched.exit(0);
        assert_eq!(sched.tid(), MAIN_TID);
        assert_eq!(sched.take_syscall_ret(), Some(child));
        assert!(sched.find_child(child).is_some());
        assert_eq!(sched.wait(child), Some(Outcome::Done(0)));
    }

    #[test]
    fn test_fork_failure() {
        let mut sched = scheduler();
        let child = sched.fork("child").unwrap();
        assert_eq!(sched.tid(), child);

        sched.fork_complete(false);
        assert_eq!(sched.tid(), MAIN_TID);
        assert_eq!(sched.take_syscall_ret(), Some(TID_ERROR));
        assert!(sched.find_child(child).is_none());

        sched.yield_current();
        assert!(sched.thread(child).is_none());
        sched.check_invariants();
    }

    #[test]
    fn test_exit_before_fork_complete_detaches() {
        let mut sched = scheduler();
        let child = sched.fork("child").unwrap();
        assert_eq!(sched.tid(), child);

        sched.exit(5);
        assert_eq!(sched.tid(), MAIN_TID);
        assert_eq!(sched.take_syscall_ret(), Some(TID_ERROR));
        assert!(sched.find_child(child).is_none());
        assert_eq!(sched.wait(child), None);
        assert!(sched.current().children().is_empty());
        sched.check_invariants();

        sched.yield_current();
        assert!(sched.thread(child).is_none());
    }

    #[test]
    fn test_exit_releases_locks() {
        let mut sched = scheduler();
        let lock = sched.lock_create();
        let holder = sched.create("holder", 40, noop, 0).unwrap();
        sched.lock_acquire(lock);

        sched.sleep_for(1);
        assert_eq!(sched.tid(), MAIN_TID);
        assert!(sched.lock_acquire(lock).is_blocked());
        assert_eq!(sched.tid(), sched.idle_tid().unwrap());

        sched.timer_interrupt();
        assert_eq!(sched.tid(), holder);
        sched.exit(0);

        assert_eq!(sched.tid(), MAIN_TID);
        assert!(sched.lock_held_by_current(lock));
        sched.check_invariants();
    }

    #[test]
    fn test_exit_orphans_and_reclaims_children() {
        let mut sched = scheduler();
        let a = sched.create("a", 40, noop, 0).unwrap();
        assert_eq!(sched.tid(), a);

        let zombie = sched.create("zombie", 50, noop, 0).unwrap();
        sched.exit(1);
        assert_eq!(sched.tid(), a);
        let orphan = sched.create("orphan", 10, noop, 0).unwrap();

        sched.exit(2);
        assert!(sched.thread(zombie).is_none());
        assert_eq!(sched.thread(orphan).unwrap().parent(), None);
        sched.check_invariants();
    }

    #[test]
    fn test_fd_table_ops() {
        let mut sched = scheduler();
        let fd = sched.fd_alloc(FileHandle(5)).unwrap();
        assert_eq!(fd, fd::FD_FIRST);
        assert_eq!(sched.fd_get(fd), Some(FileHandle(5)));
        assert_eq!(sched.fd_close(fd), Some(FileHandle(5)));
        assert_eq!(sched.fd_get(fd), None);

        sched.set_running_file(Some(FileHandle(9)));
        assert_eq!(sched.current().running_file(), Some(FileHandle(9)));
    }
}
