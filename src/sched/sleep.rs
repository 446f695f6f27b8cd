// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Timer sleep queue
//!
//! Sleeping threads are parked in a set ordered by (deadline, stamp), so
//! the wake scan stops at the first thread that is not yet due.

use log::trace;

use super::scheduler::Scheduler;
use super::state::Queue;

impl Scheduler {
    /// Sleep until the timer reaches `deadline`
    ///
    /// A deadline that has already passed still parks the thread; the next
    /// wake scan releases it.
    ///
    /// # Panics
    ///
    /// Panics when called by the idle thread.
    pub fn sleep_until(&mut self, deadline: i64) {
        let cur = self.current;
        assert!(Some(cur) != self.idle, "idle thread cannot sleep");

        let seq = self.next_seq();
        self.sleepers.insert((deadline, seq, cur));
        trace!("sched: thread {} sleeps until tick {}", cur, deadline);
        self.park_current(Queue::Sleeping { deadline });
    }

    /// Sleep for `ticks` timer ticks
    ///
    /// Returns immediately when `ticks` is not positive.
    pub fn sleep_for(&mut self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        self.sleep_until(self.ticks + ticks);
    }

    /// Wake every sleeper whose deadline is at or before `now`
    ///
    /// Threads are released in deadline order, then a preemption check is
    /// made. Safe in interrupt context.
    ///
    /// # Returns
    ///
    /// The number of threads woken.
    pub fn wake(&mut self, now: i64) -> usize {
        let mut woken = 0;

        while let Some(&(deadline, seq, tid)) = self.sleepers.first() {
            if deadline > now {
                break;
            }
            self.sleepers.remove(&(deadline, seq, tid));
            self.tcb_mut(tid).queue = Queue::None;
            self.make_ready(tid);
            trace!("sched: woke thread {} at tick {}", tid, now);
            woken += 1;
        }

        if woken > 0 {
            self.compare_and_preempt();
        }
        woken
    }

    /// Number of sleeping threads
    pub fn sleeping_count(&self) -> usize {
        self.sleepers.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
