// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Priority donation
//!
//! The wait-for graph is thread -> lock (`wait_on_lock`) -> holder. A
//! thread's effective priority is the maximum of its base priority and the
//! effective priorities of its donors, the threads blocked on locks it
//! holds. Changes are pushed along the chain up to
//! `SchedConfig::donation_depth` hops.

use log::trace;

use super::scheduler::Scheduler;
use crate::config::{clamp_priority, Tid};
use crate::error::{Result, ThreadError};

impl Scheduler {
    /// Effective priority of the running thread
    pub fn get_priority(&self) -> i32 {
        self.current().priority
    }

    /// Set the running thread's base priority
    ///
    /// Yields if the change leaves a higher-priority thread ready.
    pub fn set_priority(&mut self, priority: i32) -> Result<()> {
        self.set_base_priority(self.current, priority)
    }

    /// Set a thread's base priority
    ///
    /// The priority is clamped into range. The effective priority is
    /// recomputed and the change is propagated to any lock holder the
    /// thread is waiting on.
    ///
    /// # Returns
    ///
    /// `PriorityManaged` under MLFQS, `NoSuchThread` for an unknown tid.
    pub fn set_base_priority(&mut self, tid: Tid, priority: i32) -> Result<()> {
        if self.config.is_mlfqs() {
            return Err(ThreadError::PriorityManaged);
        }
        let thread = self
            .threads
            .get_mut(&tid)
            .ok_or(ThreadError::NoSuchThread(tid))?;

        thread.base_priority = clamp_priority(priority);
        self.propagate_donation(tid);
        self.compare_and_preempt();
        Ok(())
    }

    /// Recompute a thread's effective priority from its base and donors
    pub(crate) fn refresh_priority(&mut self, tid: Tid) {
        if self.config.is_mlfqs() {
            return;
        }

        let thread = self.tcb(tid);
        let donated = thread.donors.iter().map(|&d| self.priority_of(d)).max();
        let priority = match donated {
            Some(donated) => donated.max(thread.base_priority),
            None => thread.base_priority,
        };

        let thread = self.tcb_mut(tid);
        if thread.priority != priority {
            trace!(
                "sched: thread {} priority {} -> {}",
                tid,
                thread.priority,
                priority
            );
            thread.priority = priority;
        }
    }

    /// Refresh `tid` and every holder along its wait-for chain
    pub(crate) fn propagate_donation(&mut self, tid: Tid) {
        let mut tid = tid;
        self.refresh_priority(tid);

        for _ in 0..self.config.donation_depth {
            let holder = self
                .tcb(tid)
                .wait_on_lock()
                .and_then(|lock| self.locks[lock.0].holder);
            match holder {
                Some(holder) => {
                    self.refresh_priority(holder);
                    tid = holder;
                }
                None => break,
            }
        }
    }

    /// Panic if `waiter` blocking on a lock held by `holder` closes a cycle
    pub(crate) fn check_wait_cycle(&self, waiter: Tid, holder: Tid) {
        let mut tid = holder;

        // A chain can be no longer than the number of threads
        for _ in 0..self.threads.len() {
            assert_ne!(tid, waiter, "lock wait cycle through thread {}", waiter);
            match self
                .tcb(tid)
                .wait_on_lock()
                .and_then(|lock| self.locks[lock.0].holder)
            {
                Some(next) => tid = next,
                None => return,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
