// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Multi-level feedback queue scheduler
//!
//! Under this policy priorities are derived rather than assigned:
//!
//! - `priority = PRI_MAX - recent_cpu / 4 - nice * 2`, clamped
//! - `recent_cpu = (2 * load_avg) / (2 * load_avg + 1) * recent_cpu + nice`
//! - `load_avg = (59/60) * load_avg + (1/60) * ready_threads`
//!
//! The running thread is charged one unit of recent CPU per tick. The load
//! average and every recent CPU value are recomputed once per second and
//! every priority on each fourth tick. The idle thread takes no part.

use log::trace;

use super::fixed_point::Fixed;
use super::scheduler::Scheduler;
use crate::config::{clamp_nice, clamp_priority, PRIORITY_RECALC_TICKS, PRI_MAX};

/// MLFQS priority for the given usage and niceness
pub fn mlfqs_priority(recent_cpu: Fixed, nice: i32) -> i32 {
    clamp_priority(PRI_MAX - (recent_cpu / 4).to_int_trunc() - nice * 2)
}

impl Scheduler {
    /// Set the running thread's niceness
    ///
    /// The value is clamped into range. Under MLFQS the thread's priority
    /// is recomputed and the thread yields if it is no longer the highest.
    pub fn set_nice(&mut self, nice: i32) {
        let cur = self.current;
        let thread = self.tcb_mut(cur);
        thread.nice = clamp_nice(nice);

        if self.config.is_mlfqs() {
            self.recompute_priority(cur);
            self.compare_and_preempt();
        }
    }

    /// Niceness of the running thread
    pub fn get_nice(&self) -> i32 {
        self.current().nice
    }

    /// 100 times the running thread's recent CPU, rounded to nearest
    pub fn get_recent_cpu(&self) -> i32 {
        (self.current().recent_cpu * 100).to_int_round()
    }

    /// 100 times the system load average, rounded to nearest
    pub fn get_load_avg(&self) -> i32 {
        (self.load_avg * 100).to_int_round()
    }

    /// Raw system load average
    pub fn load_avg(&self) -> Fixed {
        self.load_avg
    }

    /// Per-tick MLFQS bookkeeping, run from the timer interrupt
    pub(crate) fn mlfqs_tick(&mut self) {
        let cur = self.current;
        if Some(cur) != self.idle {
            let thread = self.tcb_mut(cur);
            thread.recent_cpu = thread.recent_cpu + 1;
        }

        if self.ticks % self.config.timer_freq == 0 {
            self.update_load_avg();
            self.recompute_all_recent_cpu();
        }

        if self.ticks % PRIORITY_RECALC_TICKS == 0 {
            self.recompute_all_priorities();
            self.compare_and_preempt();
        }
    }

    /// Fold the current number of ready threads into the load average
    pub fn update_load_avg(&mut self) {
        let running = usize::from(Some(self.current) != self.idle);
        let ready_threads = (self.ready.len() + running) as i32;

        self.load_avg =
            Fixed::ratio(59, 60) * self.load_avg + Fixed::ratio(1, 60) * ready_threads;
        trace!(
            "sched: load_avg {} ({} ready)",
            self.get_load_avg(),
            ready_threads
        );
    }

    /// Decay every thread's recent CPU by the load average
    pub fn recompute_all_recent_cpu(&mut self) {
        let twice_load = self.load_avg * 2;
        let decay = twice_load / (twice_load + 1);

        for thread in self.threads.values_mut() {
            if thread.is_idle() {
                continue;
            }
            thread.recent_cpu = decay * thread.recent_cpu + thread.nice;
        }
    }

    /// Recompute every thread's priority from its recent CPU and niceness
    pub fn recompute_all_priorities(&mut self) {
        for thread in self.threads.values_mut() {
            if thread.is_idle() {
                continue;
            }
            thread.priority = mlfqs_priority(thread.recent_cpu, thread.nice);
        }
    }

    fn recompute_priority(&mut self, tid: crate::config::Tid) {
        let thread = self.tcb_mut(tid);
        if !thread.is_idle() {
            thread.priority = mlfqs_priority(thread.recent_cpu, thread.nice);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
