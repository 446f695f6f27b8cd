// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler and thread management
//!
//! # Example
//! ```
//! use rustux_sched::config::{SchedConfig, PRI_DEFAULT};
//! use rustux_sched::sched::Scheduler;
//!
//! fn worker(_arg: usize) {}
//!
//! let mut scheduler = Scheduler::new(SchedConfig::default());
//! scheduler.start();
//! let tid = scheduler.create("worker", PRI_DEFAULT + 1, worker, 0).unwrap();
//! assert_eq!(scheduler.tid(), tid);
//! ```

mod donation;
pub mod fixed_point;
pub mod global;
pub mod mlfqs;
pub mod scheduler;
mod sleep;
pub mod state;
pub mod thread;

pub use fixed_point::Fixed;
pub use scheduler::{SchedStats, Scheduler, MAIN_TID};
pub use state::{Outcome, Queue, SignalKind, ThreadStatus, WaitList};
pub use thread::{Thread, ThreadFlags, ThreadFn};
