// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Counting semaphores
//!
//! `up` hands its permit directly to the highest-priority waiter (FIFO on
//! ties), so a released waiter never has to retry.

use log::trace;

use crate::sched::scheduler::Scheduler;
use crate::sched::state::{Outcome, Queue, WaitList};

/// Handle to a semaphore owned by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaId(pub(crate) usize);

/// Semaphore state
#[derive(Debug, Default)]
pub(crate) struct SemaState {
    /// Available permits
    pub(crate) value: u32,
    /// Threads blocked in `sema_down`
    pub(crate) waiters: WaitList,
}

impl Scheduler {
    /// Create a semaphore with `value` permits
    pub fn sema_create(&mut self, value: u32) -> SemaId {
        SemaId(self.semas.insert(SemaState {
            value,
            waiters: WaitList::new(),
        }))
    }

    /// Take a permit, blocking until one is available
    pub fn sema_down(&mut self, sema: SemaId) -> Outcome<()> {
        if self.sema_try_down(sema) {
            return Outcome::Done(());
        }
        assert!(!self.in_interrupt, "sema_down in interrupt context");

        let cur = self.current;
        let seq = self.next_seq();
        self.semas[sema.0].waiters.push(cur, seq);
        self.park_current(Queue::Semaphore(sema));
        Outcome::Blocked
    }

    /// Take a permit only if one is available
    pub fn sema_try_down(&mut self, sema: SemaId) -> bool {
        let state = &mut self.semas[sema.0];
        if state.value == 0 {
            return false;
        }
        state.value -= 1;
        true
    }

    /// Release a permit
    ///
    /// Safe in interrupt context.
    pub fn sema_up(&mut self, sema: SemaId) {
        let threads = &self.threads;
        let waiter = self.semas[sema.0].waiters.pop_max(|tid| {
            threads.get(&tid).map_or(crate::config::PRI_MIN, |t| t.priority)
        });

        match waiter {
            Some(tid) => {
                trace!("sched: {:?} permit handed to thread {}", sema, tid);
                self.tcb_mut(tid).queue = Queue::None;
                self.make_ready(tid);
                self.compare_and_preempt();
            }
            None => self.semas[sema.0].value += 1,
        }
    }

    /// Available permits
    pub fn sema_value(&self, sema: SemaId) -> u32 {
        self.semas[sema.0].value
    }
}

// ============================================================================
// Tests
// ============================================================================
