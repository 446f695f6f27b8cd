// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! # Rustux thread scheduling core
//!
//! The thread layer of the Rustux teaching kernel: a single-core,
//! interrupt-masked scheduler with
//!
//! - **Strict priority scheduling**: FIFO among equal priorities, preemptive
//! - **Priority donation**: lock holders inherit their waiters' priority,
//!   transitively along the wait-for chain
//! - **MLFQS**: an alternative policy deriving priority from recent CPU use
//!   and niceness, selected at boot with `-o mlfqs`
//! - **Timer sleep**: threads park until an absolute tick
//! - **Process hierarchy**: fork, wait and exit handshakes between parent
//!   and child
//!
//! ## Layout
//!
//! ```text
//! src/
//! ├── arch/         # Interrupt masking and the context-switch boundary
//! ├── sched/        # Scheduler, TCB, sleep queue, donation, MLFQS
//! ├── sync/         # IrqMutex, locks, semaphores, rendezvous
//! ├── process/      # fork / wait / exit and the open-file table
//! ├── config.rs     # Limits and boot-time policy
//! └── error.rs      # Recoverable errors
//! ```
//!
//! ## Execution model
//!
//! [`Scheduler`] is a state machine acting on behalf of the running thread.
//! An operation that suspends the caller returns [`Outcome::Blocked`] and
//! the following calls run as the thread chosen next. The kernel drives the
//! global instance in [`sched::global`]; tests drive a `Scheduler` value
//! directly.

#![cfg_attr(not(test), no_std)]

// Alloc crate for heap allocations
extern crate alloc;

pub mod arch;
pub mod config;
pub mod error;
pub mod process;
pub mod sched;
pub mod sync;

pub use config::{SchedConfig, SchedPolicy, Tid, TID_ERROR};
pub use error::{Result, ThreadError};
pub use sched::{Outcome, Scheduler, Thread, ThreadStatus};
