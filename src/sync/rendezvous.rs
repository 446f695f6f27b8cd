// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Single-use rendezvous signal
//!
//! A binary semaphore with at most one waiter. A signal with no waiter is
//! latched so the next consumer returns immediately; signals never
//! accumulate past one.

use crate::config::Tid;

/// Single-waiter signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rendezvous {
    /// Latched signal not yet consumed
    signaled: bool,
    /// Thread parked on the signal
    waiter: Option<Tid>,
}

impl Rendezvous {
    /// Create an unsignaled rendezvous
    pub const fn new() -> Self {
        Self {
            signaled: false,
            waiter: None,
        }
    }

    /// Release the signal
    ///
    /// Returns the parked waiter, which consumes the signal directly, or
    /// latches the signal when nobody is waiting.
    pub fn signal(&mut self) -> Option<Tid> {
        match self.waiter.take() {
            Some(waiter) => Some(waiter),
            None => {
                self.signaled = true;
                None
            }
        }
    }

    /// Consume a latched signal
    pub fn try_consume(&mut self) -> bool {
        core::mem::replace(&mut self.signaled, false)
    }

    /// Register `tid` as the waiter
    ///
    /// # Panics
    ///
    /// Panics if the signal is latched or another thread is already waiting.
    pub fn park(&mut self, tid: Tid) {
        assert!(!self.signaled, "parking on a latched signal");
        assert!(
            self.waiter.is_none(),
            "second waiter {} on a single-waiter signal",
            tid
        );
        self.waiter = Some(tid);
    }

    /// Check for a latched signal
    pub fn is_signaled(&self) -> bool {
        self.signaled
    }

    /// Thread parked on the signal
    pub fn waiter(&self) -> Option<Tid> {
        self.waiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_before_wait_latches_once() {
        let mut signal = Rendezvous::new();

        assert_eq!(signal.signal(), None);
        assert_eq!(signal.signal(), None);
        assert!(signal.is_signaled());

        assert!(signal.try_consume());
        assert!(!signal.try_consume());
    }

    #[test]
    fn test_signal_hands_to_waiter() {
        let mut signal = Rendezvous::new();

        signal.park(4);
        assert_eq!(signal.waiter(), Some(4));
        assert_eq!(signal.signal(), Some(4));
        assert!(!signal.is_signaled());
        assert_eq!(signal.waiter(), None);
    }

    #[test]
    #[should_panic(expected = "second waiter")]
    fn test_second_waiter_panics() {
        let mut signal = Rendezvous::new();
        signal.park(1);
        signal.park(2);
    }
}
