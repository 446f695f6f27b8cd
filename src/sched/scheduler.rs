// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler implementation
//!
//! Strict-priority preemptive scheduling on a single logical core. The
//! `Scheduler` owns every TCB and acts on behalf of the running thread:
//! when an operation suspends the caller, `current` names the thread chosen
//! next and later calls run as that thread.
//!
//! Sleep, donation, MLFQS, synchronization and process operations are
//! implemented on `Scheduler` in their own modules.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use log::{debug, info, trace, warn};
use slab::Slab;

use super::fixed_point::Fixed;
use super::mlfqs::mlfqs_priority;
use super::state::{Queue, ThreadStatus, WaitList};
use super::thread::{idle_entry, Thread, ThreadFlags, ThreadFn};
use crate::arch::{ContextSwitch, SavedContext, HOSTED_SWITCH};
use crate::config::{clamp_priority, SchedConfig, Tid, PRI_DEFAULT, PRI_MIN};
use crate::error::{Result, ThreadError};
use crate::sync::lock::LockState;
use crate::sync::semaphore::SemaState;

/// Tid of the boot thread
pub const MAIN_TID: Tid = 1;

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// Ticks spent in the idle thread
    pub idle_ticks: u64,
    /// Ticks spent in kernel threads
    pub kernel_ticks: u64,
    /// Ticks spent in user processes
    pub user_ticks: u64,
    /// Switches between two different threads
    pub context_switches: u64,
}

/// Scheduler
///
/// Manages thread lifecycles, the ready and sleep queues, locks,
/// semaphores and the load average.
pub struct Scheduler {
    /// Policy and limits
    pub(crate) config: SchedConfig,
    /// All threads in the system, in tid order
    pub(crate) threads: BTreeMap<Tid, Box<Thread>>,
    /// Currently running thread
    pub(crate) current: Tid,
    /// Idle thread, once started
    pub(crate) idle: Option<Tid>,
    /// Next tid to hand out
    next_tid: Tid,
    /// Ready queue
    pub(crate) ready: WaitList,
    /// Sleep queue: (deadline, stamp, tid), ascending
    pub(crate) sleepers: BTreeSet<(i64, u64, Tid)>,
    /// Queue insertion stamp
    seq: u64,
    /// Timer ticks since boot
    pub(crate) ticks: i64,
    /// MLFQS system load average
    pub(crate) load_avg: Fixed,
    /// Lock arena
    pub(crate) locks: Slab<LockState>,
    /// Semaphore arena
    pub(crate) semas: Slab<SemaState>,
    /// Exited threads to reclaim at the next scheduling decision
    destruction: Vec<Tid>,
    /// Inside the timer interrupt handler
    pub(crate) in_interrupt: bool,
    /// Yield once the interrupt handler returns
    pub(crate) yield_on_return: bool,
    /// Tick and switch counters
    stats: SchedStats,
    /// Register save/restore primitive
    switcher: &'static dyn ContextSwitch,
}

impl Scheduler {
    /// Create a scheduler, turning the boot context into the `main` thread
    pub fn new(config: SchedConfig) -> Self {
        Self::with_switch(config, &HOSTED_SWITCH)
    }

    /// Create a scheduler that switches contexts with `switcher`
    pub fn with_switch(config: SchedConfig, switcher: &'static dyn ContextSwitch) -> Self {
        let mut main = Box::new(Thread::new(
            MAIN_TID,
            "main",
            PRI_DEFAULT,
            SavedContext::empty(),
        ));
        main.flags = ThreadFlags::MAIN;
        main.status = ThreadStatus::Running;
        if config.is_mlfqs() {
            main.priority = mlfqs_priority(main.recent_cpu, main.nice);
        }

        let mut threads = BTreeMap::new();
        threads.insert(MAIN_TID, main);

        debug!("sched: init, policy {:?}", config.policy);

        Self {
            config,
            threads,
            current: MAIN_TID,
            idle: None,
            next_tid: MAIN_TID + 1,
            ready: WaitList::new(),
            sleepers: BTreeSet::new(),
            seq: 0,
            ticks: 0,
            load_avg: Fixed::ZERO,
            locks: Slab::new(),
            semas: Slab::new(),
            destruction: Vec::new(),
            in_interrupt: false,
            yield_on_return: false,
            stats: SchedStats::default(),
            switcher,
        }
    }

    /// Create the idle thread
    ///
    /// The idle thread never enters the ready queue; it runs only when
    /// nothing else is ready.
    pub fn start(&mut self) {
        assert!(self.idle.is_none(), "scheduler already started");

        let tid = self.allocate_tid();
        let mut idle = Box::new(Thread::new(
            tid,
            "idle",
            PRI_MIN,
            SavedContext::for_entry(idle_entry, 0),
        ));
        idle.flags = ThreadFlags::IDLE;
        self.threads.insert(tid, idle);
        self.idle = Some(tid);

        debug!("sched: started, idle thread {}", tid);
    }

    /// ========================================================================
    /// Thread lifecycle
    /// ========================================================================

    /// Create a thread running `entry(arg)` and make it ready
    ///
    /// The priority is clamped into range. The new thread preempts the
    /// caller if its priority is higher.
    ///
    /// # Returns
    ///
    /// The new thread's tid, or `TooManyThreads` when the thread table is
    /// full.
    pub fn create(&mut self, name: &str, priority: i32, entry: ThreadFn, arg: usize) -> Result<Tid> {
        let tid = self.spawn(name, priority, SavedContext::for_entry(entry, arg))?;
        self.compare_and_preempt();
        Ok(tid)
    }

    /// Allocate and enqueue a TCB without a preemption check
    pub(crate) fn spawn(&mut self, name: &str, priority: i32, context: SavedContext) -> Result<Tid> {
        assert!(!self.in_interrupt, "thread creation in interrupt context");

        let live = self.threads.len();
        if live >= self.config.max_threads {
            warn!("sched: cannot create '{}': {} threads live", name, live);
            return Err(ThreadError::TooManyThreads(live));
        }

        let tid = self.allocate_tid();
        let creator = self.current;
        let mut thread = Box::new(Thread::new(tid, name, clamp_priority(priority), context));

        let creator_tcb = self.tcb(creator);
        let tracked = !creator_tcb.is_idle();
        if self.config.is_mlfqs() {
            if tracked {
                thread.nice = creator_tcb.nice;
                thread.recent_cpu = creator_tcb.recent_cpu;
            }
            thread.priority = mlfqs_priority(thread.recent_cpu, thread.nice);
        }
        if tracked {
            thread.parent = Some(creator);
            self.tcb_mut(creator).children.push(tid);
        }

        debug!(
            "sched: create thread {} '{}' priority {}",
            tid, thread.name, thread.priority
        );
        self.threads.insert(tid, thread);
        self.make_ready(tid);

        Ok(tid)
    }

    /// Block the running thread until [`unblock`](Self::unblock) is called
    pub fn block(&mut self) {
        self.park_current(Queue::None);
    }

    /// Make a thread blocked by [`block`](Self::block) ready
    ///
    /// Safe in interrupt context: this never preempts the running thread.
    pub fn unblock(&mut self, tid: Tid) -> Result<()> {
        let thread = self
            .threads
            .get(&tid)
            .ok_or(ThreadError::NoSuchThread(tid))?;

        if thread.status != ThreadStatus::Blocked || thread.queue != Queue::None || thread.is_idle() {
            return Err(ThreadError::NotBlocked(tid));
        }

        self.make_ready(tid);
        Ok(())
    }

    /// Yield the CPU
    ///
    /// The running thread goes back on the ready queue (unless it is the
    /// idle thread) and the highest-priority ready thread runs.
    pub fn yield_current(&mut self) {
        assert!(!self.in_interrupt, "yield in interrupt context");

        let cur = self.current;
        if Some(cur) == self.idle {
            self.tcb_mut(cur).status = ThreadStatus::Blocked;
        } else {
            self.make_ready(cur);
        }
        self.schedule();
    }

    /// Yield if a ready thread has strictly higher priority
    ///
    /// The idle thread yields to any ready thread. In interrupt context the
    /// yield is deferred until the handler returns.
    ///
    /// # Returns
    ///
    /// Whether a yield happened or was requested.
    pub fn compare_and_preempt(&mut self) -> bool {
        let cur = self.current;
        if self.tcb(cur).status != ThreadStatus::Running {
            return false;
        }

        let threads = &self.threads;
        let head = match self.ready.peek_max(|tid| priority_in(threads, tid)) {
            Some(head) => head,
            None => return false,
        };

        if Some(cur) != self.idle && self.priority_of(head) <= self.priority_of(cur) {
            return false;
        }

        trace!("sched: thread {} preempts {}", head, cur);
        if self.in_interrupt {
            self.yield_on_return = true;
        } else {
            self.yield_current();
        }
        true
    }

    /// Timer interrupt hook
    ///
    /// Advances the tick count, charges the tick to the running thread,
    /// runs MLFQS bookkeeping and wakes due sleepers. A yield requested
    /// while handling the tick happens on the way out.
    pub fn timer_interrupt(&mut self) {
        self.in_interrupt = true;
        self.ticks += 1;

        let cur = self.current;
        let (is_idle, is_user) = {
            let thread = self.tcb(cur);
            (thread.is_idle(), thread.flags.contains(ThreadFlags::USER))
        };
        if is_idle {
            self.stats.idle_ticks += 1;
        } else if is_user {
            self.stats.user_ticks += 1;
        } else {
            self.stats.kernel_ticks += 1;
        }

        let used = {
            let thread = self.tcb_mut(cur);
            thread.slice_ticks += 1;
            thread.slice_ticks
        };
        if !is_idle && used >= self.config.time_slice {
            self.yield_on_return = true;
        }

        if self.config.is_mlfqs() {
            self.mlfqs_tick();
        }

        self.wake(self.ticks);

        self.in_interrupt = false;
        if core::mem::take(&mut self.yield_on_return) {
            self.yield_current();
        }
    }

    /// ========================================================================
    /// Accessors
    /// ========================================================================

    /// The running thread
    ///
    /// # Panics
    ///
    /// Panics if the thread's stack guard has been overwritten.
    pub fn current(&self) -> &Thread {
        let thread = self.tcb(self.current);
        assert!(
            thread.is_intact(),
            "stack overflow detected in thread {}",
            thread.tid
        );
        assert_eq!(thread.status, ThreadStatus::Running);
        thread
    }

    /// Tid of the running thread
    pub fn tid(&self) -> Tid {
        self.current().tid
    }

    /// Name of the running thread
    pub fn name(&self) -> &str {
        self.current().name()
    }

    /// Look up a thread that has not been reclaimed
    pub fn thread(&self, tid: Tid) -> Option<&Thread> {
        self.threads.get(&tid).map(|thread| &**thread)
    }

    /// All threads in tid order
    pub fn threads(&self) -> impl Iterator<Item = &Thread> + '_ {
        self.threads.values().map(|thread| &**thread)
    }

    /// Tid of the idle thread, once started
    pub fn idle_tid(&self) -> Option<Tid> {
        self.idle
    }

    /// Timer ticks since boot
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Active configuration
    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    /// Number of threads in the ready queue
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Scheduling statistics
    pub fn stats(&self) -> SchedStats {
        self.stats
    }

    /// Log scheduling statistics
    pub fn print_stats(&self) {
        info!(
            "Thread: {} idle ticks, {} kernel ticks, {} user ticks",
            self.stats.idle_ticks, self.stats.kernel_ticks, self.stats.user_ticks
        );
        info!("Thread: {} context switches", self.stats.context_switches);
    }

    /// Take the result delivered to the running thread while it was parked
    pub fn take_syscall_ret(&mut self) -> Option<i32> {
        let cur = self.current;
        self.tcb_mut(cur).syscall_ret.take()
    }

    /// Check the scheduler's structural invariants
    ///
    /// # Panics
    ///
    /// Panics on the first violated invariant.
    pub fn check_invariants(&self) {
        let running: Vec<Tid> = self
            .threads
            .values()
            .filter(|t| t.status == ThreadStatus::Running)
            .map(|t| t.tid)
            .collect();
        assert_eq!(running, [self.current], "exactly one running thread");

        let mut ready = 0;
        for thread in self.threads.values() {
            let tid = thread.tid;
            match thread.status {
                ThreadStatus::Ready => {
                    ready += 1;
                    assert_eq!(thread.queue, Queue::Ready, "thread {} ready off-queue", tid);
                    assert!(self.ready.contains(tid), "thread {} missing from ready queue", tid);
                }
                ThreadStatus::Running | ThreadStatus::Dying => {
                    assert_eq!(thread.queue, Queue::None, "thread {} queued", tid);
                }
                ThreadStatus::Blocked => self.check_parked(thread),
            }

            if !self.config.is_mlfqs() && !thread.is_idle() {
                // Donations travel at most `donation_depth` hops
                let depth = self.config.donation_depth;
                if self.donor_height(tid, depth) <= depth {
                    let donated = thread.donors.iter().map(|&d| self.priority_of(d)).max();
                    let expected =
                        donated.map_or(thread.base_priority, |p| p.max(thread.base_priority));
                    assert_eq!(thread.priority, expected, "stale priority on thread {}", tid);
                } else {
                    assert!(
                        thread.priority >= thread.base_priority,
                        "priority below base on thread {}",
                        tid
                    );
                }
            }
        }
        assert_eq!(ready, self.ready.len(), "ready queue holds non-ready threads");
    }

    /// Height of the donor tree under `tid`, counted up to `limit + 1`
    fn donor_height(&self, tid: Tid, limit: usize) -> usize {
        let donors = &self.tcb(tid).donors;
        if donors.is_empty() {
            return 0;
        }
        if limit == 0 {
            return 1;
        }
        1 + donors
            .iter()
            .map(|&donor| self.donor_height(donor, limit - 1))
            .max()
            .unwrap_or(0)
    }

    fn check_parked(&self, thread: &Thread) {
        let tid = thread.tid;
        let parked = match thread.queue {
            Queue::None => true,
            Queue::Ready => false,
            Queue::Sleeping { deadline } => self
                .sleepers
                .iter()
                .any(|&(d, _, t)| t == tid && d == deadline),
            Queue::Lock(lock) => self.locks[lock.0].waiters.contains(tid),
            Queue::Semaphore(sema) => self.semas[sema.0].waiters.contains(tid),
            Queue::Signal { owner, kind } => {
                let owner = self.tcb(owner);
                let signal = match kind {
                    super::state::SignalKind::ForkLoad => &owner.fork_signal,
                    super::state::SignalKind::Wait => &owner.wait_signal,
                };
                signal.waiter() == Some(tid)
            }
        };
        assert!(parked, "thread {} not on the queue it names", tid);
    }

    /// ========================================================================
    /// Internals
    /// ========================================================================

    pub(crate) fn tcb(&self, tid: Tid) -> &Thread {
        match self.threads.get(&tid) {
            Some(thread) => thread,
            None => panic!("no TCB for thread {}", tid),
        }
    }

    pub(crate) fn tcb_mut(&mut self, tid: Tid) -> &mut Thread {
        match self.threads.get_mut(&tid) {
            Some(thread) => thread,
            None => panic!("no TCB for thread {}", tid),
        }
    }

    pub(crate) fn priority_of(&self, tid: Tid) -> i32 {
        priority_in(&self.threads, tid)
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn allocate_tid(&mut self) -> Tid {
        let tid = self.next_tid;
        self.next_tid += 1;
        tid
    }

    /// Put a thread on the ready queue
    pub(crate) fn make_ready(&mut self, tid: Tid) {
        let seq = self.next_seq();
        let thread = self.tcb_mut(tid);
        thread.status = ThreadStatus::Ready;
        thread.queue = Queue::Ready;
        self.ready.push(tid, seq);
        trace!("sched: thread {} ready", tid);
    }

    /// Block the running thread on `queue` and switch away
    ///
    /// The caller has already linked the thread into that queue.
    pub(crate) fn park_current(&mut self, queue: Queue) {
        assert!(!self.in_interrupt, "blocking in interrupt context");

        let cur = self.current;
        let thread = self.tcb_mut(cur);
        thread.status = ThreadStatus::Blocked;
        thread.queue = queue;
        trace!("sched: thread {} parked on {:?}", cur, queue);
        self.schedule();
    }

    /// Queue an exited thread for reclamation
    pub(crate) fn defer_destroy(&mut self, tid: Tid) {
        self.destruction.push(tid);
    }

    /// Remove a TCB for good
    pub(crate) fn destroy(&mut self, tid: Tid) {
        if self.threads.remove(&tid).is_some() {
            debug!("sched: reclaimed thread {}", tid);
        }
    }

    /// Switch to the highest-priority ready thread
    ///
    /// The running thread's status must already have been changed.
    pub(crate) fn schedule(&mut self) {
        let prev = self.current;
        debug_assert_ne!(self.tcb(prev).status, ThreadStatus::Running);

        // Reclaim exited threads other than the one switching away
        let pending = core::mem::take(&mut self.destruction);
        for tid in pending {
            if tid == prev {
                self.destruction.push(tid);
            } else {
                self.destroy(tid);
            }
        }

        let threads = &self.threads;
        let next = match self.ready.pop_max(|tid| priority_in(threads, tid)) {
            Some(tid) => tid,
            None => match self.idle {
                Some(idle) => idle,
                None => panic!("no thread ready to run"),
            },
        };

        let thread = self.tcb_mut(next);
        assert!(thread.is_intact(), "stack overflow detected in thread {}", next);
        thread.status = ThreadStatus::Running;
        thread.queue = Queue::None;
        thread.slice_ticks = 0;
        self.current = next;

        if prev != next {
            self.stats.context_switches += 1;
            trace!("sched: switch {} -> {}", prev, next);

            let prev_context: *mut SavedContext = &mut self.tcb_mut(prev).context;
            let next_context: *const SavedContext = &self.tcb(next).context;
            // SAFETY: both TCBs are boxed and stay in the table across the
            // switch; the scheduler is only entered with interrupts masked.
            unsafe { self.switcher.switch(prev_context, next_context) };
        }
    }
}

/// Effective priority of `tid`, or `PRI_MIN` for a reclaimed thread
fn priority_in(threads: &BTreeMap<Tid, Box<Thread>>, tid: Tid) -> i32 {
    threads.get(&tid).map_or(PRI_MIN, |thread| thread.priority)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_arg: usize) {}

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedConfig::default())
    }

    #[test]
    fn test_init_main_running() {
        let sched = scheduler();
        assert_eq!(sched.tid(), MAIN_TID);
        assert_eq!(sched.name(), "main");
        assert_eq!(sched.current().priority(), PRI_DEFAULT);
        assert!(sched.current().flags().contains(ThreadFlags::MAIN));
        sched.check_invariants();
    }

    #[test]
    fn test_create_higher_priority_preempts() {
        let mut sched = scheduler();
        let tid = sched.create("high", 40, noop, 0).unwrap();

        assert_eq!(sched.tid(), tid);
        assert_eq!(sched.thread(MAIN_TID).unwrap().status(), ThreadStatus::Ready);
        assert_eq!(sched.stats().context_switches, 1);
        sched.check_invariants();
    }

    #[test]
    fn test_create_clamps_priority() {
        let mut sched = scheduler();
        let low = sched.create("low", -10, noop, 0).unwrap();
        assert_eq!(sched.thread(low).unwrap().priority(), PRI_MIN);
        assert_eq!(sched.tid(), MAIN_TID);

        let high = sched.create("high", 1000, noop, 0).unwrap();
        assert_eq!(sched.thread(high).unwrap().priority(), crate::config::PRI_MAX);
        assert_eq!(sched.tid(), high);
    }

    #[test]
    fn test_equal_priority_round_robin() {
        let mut sched = scheduler();
        let a = sched.create("a", PRI_DEFAULT, noop, 0).unwrap();
        let b = sched.create("b", PRI_DEFAULT, noop, 0).unwrap();
        assert_eq!(sched.tid(), MAIN_TID);

        sched.yield_current();
        assert_eq!(sched.tid(), a);
        sched.yield_current();
        assert_eq!(sched.tid(), b);
        sched.yield_current();
        assert_eq!(sched.tid(), MAIN_TID);
        sched.check_invariants();
    }

    #[test]
    fn test_creator_becomes_parent() {
        let mut sched = scheduler();
        let child = sched.create("child", 10, noop, 0).unwrap();

        assert_eq!(sched.thread(child).unwrap().parent(), Some(MAIN_TID));
        assert_eq!(sched.current().children(), [child]);
    }

    #[test]
    fn test_block_and_unblock() {
        let mut sched = scheduler();
        let a = sched.create("a", PRI_DEFAULT, noop, 0).unwrap();

        sched.block();
        assert_eq!(sched.tid(), a);
        assert_eq!(sched.thread(MAIN_TID).unwrap().status(), ThreadStatus::Blocked);

        assert_eq!(sched.unblock(MAIN_TID), Ok(()));
        // Unblocking never preempts
        assert_eq!(sched.tid(), a);
        assert_eq!(sched.unblock(MAIN_TID), Err(ThreadError::NotBlocked(MAIN_TID)));
        assert_eq!(sched.unblock(999), Err(ThreadError::NoSuchThread(999)));
        sched.check_invariants();
    }

    #[test]
    fn test_idle_runs_when_nothing_ready() {
        let mut sched = scheduler();
        sched.start();
        let idle = sched.idle_tid().unwrap();
        assert_eq!(sched.ready_count(), 0);

        sched.block();
        assert_eq!(sched.tid(), idle);
        sched.check_invariants();

        sched.timer_interrupt();
        assert_eq!(sched.stats().idle_ticks, 1);

        sched.unblock(MAIN_TID).unwrap();
        assert!(sched.compare_and_preempt());
        assert_eq!(sched.tid(), MAIN_TID);
        assert_eq!(sched.unblock(idle), Err(ThreadError::NotBlocked(idle)));
        sched.check_invariants();
    }

    #[test]
    fn test_quantum_expiry_yields() {
        let mut sched = scheduler();
        let a = sched.create("a", PRI_DEFAULT, noop, 0).unwrap();

        for _ in 0..3 {
            sched.timer_interrupt();
            assert_eq!(sched.tid(), MAIN_TID);
        }
        sched.timer_interrupt();
        assert_eq!(sched.tid(), a);
        assert_eq!(sched.stats().kernel_ticks, 4);
        sched.check_invariants();
    }

    #[test]
    fn test_too_many_threads() {
        let mut config = SchedConfig::default();
        config.max_threads = 2;
        let mut sched = Scheduler::new(config);

        assert!(sched.create("a", 10, noop, 0).is_ok());
        assert_eq!(
            sched.create("b", 10, noop, 0),
            Err(ThreadError::TooManyThreads(2))
        );
        sched.check_invariants();
    }

    #[test]
    #[should_panic(expected = "stack overflow")]
    fn test_corrupted_guard_is_fatal() {
        let mut sched = scheduler();
        sched.tcb_mut(MAIN_TID).magic = 0;
        let _ = sched.current();
    }

    #[test]
    fn test_print_stats_does_not_disturb_state() {
        let mut sched = scheduler();
        sched.timer_interrupt();
        sched.print_stats();
        assert_eq!(sched.stats().kernel_ticks, 1);
        assert_eq!(sched.ticks(), 1);
    }
}
