// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Sleeping locks with priority donation
//!
//! A lock has at most one holder. A thread that finds the lock held joins
//! its wait list and, under the priority policy, donates its priority to
//! the holder. Release hands the lock straight to the highest-priority
//! waiter; the remaining waiters then donate to the new holder.

use log::trace;

use crate::config::Tid;
use crate::sched::scheduler::Scheduler;
use crate::sched::state::{Outcome, Queue, WaitList};

/// Handle to a lock owned by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockId(pub(crate) usize);

/// Lock state
#[derive(Debug, Default)]
pub(crate) struct LockState {
    /// Owning thread
    pub(crate) holder: Option<Tid>,
    /// Threads blocked in `lock_acquire`
    pub(crate) waiters: WaitList,
}

impl Scheduler {
    /// Create a free lock
    pub fn lock_create(&mut self) -> LockId {
        LockId(self.locks.insert(LockState::default()))
    }

    /// Acquire a lock, blocking while another thread holds it
    ///
    /// # Returns
    ///
    /// `Done` if the lock was free, otherwise `Blocked`; the lock is owned
    /// by the caller by the time it runs again.
    ///
    /// # Panics
    ///
    /// Panics if the caller already holds the lock, if waiting would close
    /// a wait-for cycle, or in interrupt context.
    pub fn lock_acquire(&mut self, lock: LockId) -> Outcome<()> {
        assert!(!self.in_interrupt, "lock_acquire in interrupt context");
        let cur = self.current;

        let holder = match self.locks[lock.0].holder {
            None => {
                self.take_lock(cur, lock);
                return Outcome::Done(());
            }
            Some(holder) => holder,
        };
        assert_ne!(holder, cur, "thread {} already holds {:?}", cur, lock);
        self.check_wait_cycle(cur, holder);

        let seq = self.next_seq();
        self.locks[lock.0].waiters.push(cur, seq);
        self.tcb_mut(cur).queue = Queue::Lock(lock);

        if !self.config.is_mlfqs() {
            self.tcb_mut(holder).donors.push(cur);
            self.propagate_donation(holder);
        }

        trace!("sched: thread {} waits for {:?} held by {}", cur, lock, holder);
        self.park_current(Queue::Lock(lock));
        Outcome::Blocked
    }

    /// Acquire a lock only if it is free
    pub fn lock_try_acquire(&mut self, lock: LockId) -> bool {
        if self.locks[lock.0].holder.is_some() {
            return false;
        }
        self.take_lock(self.current, lock);
        true
    }

    /// Release a lock held by the running thread
    ///
    /// # Panics
    ///
    /// Panics if the running thread does not hold the lock.
    pub fn lock_release(&mut self, lock: LockId) {
        let cur = self.current;
        assert_eq!(
            self.locks[lock.0].holder,
            Some(cur),
            "thread {} releasing {:?} it does not hold",
            cur,
            lock
        );

        self.hand_off_lock(cur, lock);
        self.compare_and_preempt();
    }

    /// Thread holding a lock
    pub fn lock_holder(&self, lock: LockId) -> Option<Tid> {
        self.locks[lock.0].holder
    }

    /// Check whether the running thread holds a lock
    pub fn lock_held_by_current(&self, lock: LockId) -> bool {
        self.locks[lock.0].holder == Some(self.current)
    }

    /// Number of threads waiting for a lock
    pub fn lock_waiters(&self, lock: LockId) -> usize {
        self.locks[lock.0].waiters.len()
    }

    fn take_lock(&mut self, tid: Tid, lock: LockId) {
        self.locks[lock.0].holder = Some(tid);
        self.tcb_mut(tid).held_locks.push(lock);
    }

    /// Release `lock` from `owner` and give it to the best waiter
    pub(crate) fn hand_off_lock(&mut self, owner: Tid, lock: LockId) {
        let thread = self.tcb_mut(owner);
        thread.held_locks.retain(|&held| held != lock);

        // Drop only the donors that were waiting on this lock
        let donors = core::mem::take(&mut thread.donors);
        let kept = donors
            .into_iter()
            .filter(|&donor| self.tcb(donor).wait_on_lock() != Some(lock))
            .collect();
        self.tcb_mut(owner).donors = kept;
        self.refresh_priority(owner);

        let threads = &self.threads;
        let state = &mut self.locks[lock.0];
        let next = state.waiters.pop_max(|tid| {
            threads.get(&tid).map_or(crate::config::PRI_MIN, |t| t.priority)
        });

        let next = match next {
            Some(next) => next,
            None => {
                state.holder = None;
                return;
            }
        };
        let remaining: alloc::vec::Vec<Tid> = state.waiters.tids().collect();

        trace!("sched: {:?} handed from {} to {}", lock, owner, next);
        self.tcb_mut(next).queue = Queue::None;
        self.take_lock(next, lock);
        if !self.config.is_mlfqs() {
            self.tcb_mut(next).donors.extend(remaining);
            self.refresh_priority(next);
        }
        self.make_ready(next);
    }
}

// ============================================================================
// Tests
// ============================================================================
