// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Synchronization Primitives
//!
//! # Primitives
//!
//! - **IrqMutex**: Spin mutex entered with interrupts masked
//! - **Lock**: Sleeping lock with priority donation
//! - **Semaphore**: Counting semaphore with priority-ordered waiters
//! - **Rendezvous**: Single-waiter signal for process handshakes
//!
//! Locks and semaphores live in arenas inside the scheduler and are
//! addressed by [`LockId`] and [`SemaId`]; their operations are methods on
//! [`Scheduler`](crate::sched::Scheduler).

pub mod irq_mutex;
pub mod lock;
pub mod rendezvous;
pub mod semaphore;

// Re-exports
pub use irq_mutex::{IrqMutex, IrqMutexGuard};
pub use lock::LockId;
pub use rendezvous::Rendezvous;
pub use semaphore::SemaId;
