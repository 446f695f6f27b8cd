// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Recoverable scheduler errors
//!
//! Invariant violations (guard corruption, lock misuse, wait-for cycles)
//! are not represented here: they panic.

use crate::config::Tid;

/// Errors returned by thread operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ThreadError {
    /// No TCB could be allocated
    #[error("thread table exhausted ({0} live threads)")]
    TooManyThreads(usize),

    /// The thread does not exist (never created or already reclaimed)
    #[error("no such thread: {0}")]
    NoSuchThread(Tid),

    /// The thread is not in a state where it can be unblocked
    #[error("thread {0} is not blocked")]
    NotBlocked(Tid),

    /// Priority is derived by the MLFQS policy and cannot be assigned
    #[error("priority is managed by the MLFQS policy")]
    PriorityManaged,
}

/// Result type for thread operations
pub type Result<T> = core::result::Result<T, ThreadError>;
