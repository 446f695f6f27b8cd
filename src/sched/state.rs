// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread state and queue definitions
//!
//! Defines the thread status, the queue a thread is parked on, and the
//! priority-ordered wait list shared by the ready queue, lock waiters and
//! semaphore waiters.

use alloc::vec::Vec;

use crate::config::Tid;
use crate::sync::{LockId, SemaId};

/// Thread status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Thread is currently running
    Running,
    /// Thread is ready to run
    Ready,
    /// Thread is waiting for an event
    Blocked,
    /// Thread has exited and awaits reclamation
    Dying,
}

/// Which rendezvous a thread is parked on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Child finished its initial setup
    ForkLoad,
    /// Child published its exit status
    Wait,
}

/// The queue that currently owns a thread, if any
///
/// A thread is in at most one queue; this tag names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Queue {
    /// Not queued: running, dying, or blocked by a bare `block()`
    #[default]
    None,
    /// Ready queue
    Ready,
    /// Sleep queue until the given tick
    Sleeping { deadline: i64 },
    /// Wait list of a lock
    Lock(LockId),
    /// Wait list of a semaphore
    Semaphore(SemaId),
    /// A process rendezvous owned by thread `owner`
    Signal { owner: Tid, kind: SignalKind },
}

/// Result of an operation that may suspend the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Completed without blocking
    Done(T),
    /// The caller was parked; the next call runs as another thread
    Blocked,
}

impl<T> Outcome<T> {
    /// Check whether the caller was parked
    pub fn is_blocked(&self) -> bool {
        matches!(self, Outcome::Blocked)
    }

    /// Value of a completed operation
    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Blocked => None,
        }
    }
}

/// ============================================================================
/// Wait list
/// ============================================================================

/// Entry in a [`WaitList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WaitEntry {
    tid: Tid,
    /// Insertion stamp; lower enters first
    seq: u64,
}

/// Priority-ordered list of parked threads
///
/// Threads are stored in insertion order together with a stamp. The
/// highest-priority entry is selected when popping, with ties going to the
/// lowest stamp, so priorities that change while a thread is queued are
/// always honoured.
#[derive(Debug, Default)]
pub struct WaitList {
    entries: Vec<WaitEntry>,
}

impl WaitList {
    /// Create an empty wait list
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a thread with insertion stamp `seq`
    pub fn push(&mut self, tid: Tid, seq: u64) {
        debug_assert!(!self.contains(tid), "thread {} queued twice", tid);
        self.entries.push(WaitEntry { tid, seq });
    }

    /// Remove a thread, returning whether it was present
    pub fn remove(&mut self, tid: Tid) -> bool {
        match self.entries.iter().position(|e| e.tid == tid) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Highest-priority thread without removing it
    ///
    /// `priority_of` maps a thread to its effective priority.
    pub fn peek_max(&self, priority_of: impl Fn(Tid) -> i32) -> Option<Tid> {
        self.max_index(priority_of).map(|index| self.entries[index].tid)
    }

    /// Remove and return the highest-priority thread
    pub fn pop_max(&mut self, priority_of: impl Fn(Tid) -> i32) -> Option<Tid> {
        self.max_index(priority_of)
            .map(|index| self.entries.remove(index).tid)
    }

    fn max_index(&self, priority_of: impl Fn(Tid) -> i32) -> Option<usize> {
        let mut best: Option<(usize, i32, u64)> = None;

        for (index, entry) in self.entries.iter().enumerate() {
            let priority = priority_of(entry.tid);
            let better = match best {
                None => true,
                Some((_, best_priority, best_seq)) => {
                    priority > best_priority || (priority == best_priority && entry.seq < best_seq)
                }
            };
            if better {
                best = Some((index, priority, entry.seq));
            }
        }

        best.map(|(index, _, _)| index)
    }

    /// Check if a thread is queued
    pub fn contains(&self, tid: Tid) -> bool {
        self.entries.iter().any(|e| e.tid == tid)
    }

    /// Queued threads in insertion order
    pub fn tids(&self) -> impl Iterator<Item = Tid> + '_ {
        self.entries.iter().map(|e| e.tid)
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued threads
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
