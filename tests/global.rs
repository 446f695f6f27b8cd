// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Global scheduler instance
//!
//! The instance is process-wide, so everything is checked in one test.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use rustux_sched::arch::{interrupts, ContextSwitch, SavedContext};
use rustux_sched::config::{SchedConfig, PRI_DEFAULT, TID_ERROR};
use rustux_sched::sched::{global, MAIN_TID};

fn noop(_arg: usize) {}

static SWITCHES: AtomicUsize = AtomicUsize::new(0);
static LOCK_TAKEN_IN_SWITCH: AtomicBool = AtomicBool::new(false);
static SWITCHED_TO: AtomicI32 = AtomicI32::new(0);

/// Switch that enters the scheduler the way the next thread would
struct RecordingSwitch;

static RECORDING_SWITCH: RecordingSwitch = RecordingSwitch;

impl ContextSwitch for RecordingSwitch {
    unsafe fn switch(&self, _prev: *mut SavedContext, _next: *const SavedContext) {
        SWITCHES.fetch_add(1, Ordering::SeqCst);
        match global::try_with(|s| s.tid()) {
            Some(tid) => SWITCHED_TO.store(tid, Ordering::SeqCst),
            None => LOCK_TAKEN_IN_SWITCH.store(true, Ordering::SeqCst),
        }
    }
}

#[test]
fn test_global_scheduler() {
    assert!(!global::is_initialized());

    let mut config = SchedConfig::default();
    config.max_threads = 3;
    global::init_with_switch(config, &RECORDING_SWITCH);
    global::start();
    assert!(global::is_initialized());

    assert_eq!(global::current_tid(), MAIN_TID);
    assert_eq!(global::current_name(), "main");
    assert_eq!(global::get_priority(), PRI_DEFAULT);

    let worker = global::create("worker", PRI_DEFAULT + 10, noop, 0);
    assert_eq!(global::current_tid(), worker);
    assert_eq!(SWITCHES.load(Ordering::SeqCst), 1);
    assert_eq!(SWITCHED_TO.load(Ordering::SeqCst), worker);
    assert_eq!(global::create("extra", PRI_DEFAULT, noop, 0), TID_ERROR);

    global::sleep_for(1);
    assert_eq!(global::current_tid(), MAIN_TID);
    global::tick();
    assert_eq!(global::ticks(), 1);
    assert_eq!(global::current_tid(), worker);

    global::exit(0);
    assert_eq!(global::current_tid(), MAIN_TID);
    assert_eq!(SWITCHED_TO.load(Ordering::SeqCst), MAIN_TID);
    assert!(global::set_priority(PRI_DEFAULT + 1).is_ok());
    assert_eq!(global::get_priority(), PRI_DEFAULT + 1);

    global::with(|s| s.check_invariants());
    global::print_stats();

    // The next thread could always enter the scheduler mid-switch
    assert!(SWITCHES.load(Ordering::SeqCst) >= 4);
    assert!(!LOCK_TAKEN_IN_SWITCH.load(Ordering::SeqCst));
    assert!(global::try_with(|_| ()).is_some());

    // Every call restored the interrupt level
    assert!(interrupts::are_enabled());
}
