// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler configuration
//!
//! Compile-time limits and the boot-time policy selection. The policy is
//! chosen once from the kernel command line and read at every scheduling
//! decision point.

/// ============================================================================
/// Constants
/// ============================================================================

/// Thread identifier type
pub type Tid = i32;

/// Error value for [`Tid`], returned across the system call boundary
pub const TID_ERROR: Tid = -1;

/// Lowest priority
pub const PRI_MIN: i32 = 0;

/// Default priority
pub const PRI_DEFAULT: i32 = 31;

/// Highest priority
pub const PRI_MAX: i32 = 63;

/// Lowest nice value (most favoured)
pub const NICE_MIN: i32 = -20;

/// Default nice value
pub const NICE_DEFAULT: i32 = 0;

/// Highest nice value (least favoured)
pub const NICE_MAX: i32 = 20;

/// Timer interrupts per second
pub const TIMER_FREQ: i64 = 100;

/// Ticks a thread may run before it is forced to yield
pub const TIME_SLICE: u32 = 4;

/// MLFQS priorities are recomputed on every multiple of this tick count
pub const PRIORITY_RECALC_TICKS: i64 = 4;

/// Maximum number of live TCBs
pub const MAX_THREADS: usize = 1024;

/// Maximum depth followed when propagating a donation
pub const DONATION_DEPTH: usize = 8;

/// Open-file slots per thread
pub const FDT_MAX: usize = 64;

/// Maximum thread name length in bytes (the name field holds 16 with NUL)
pub const NAME_MAX: usize = 15;

/// Guard value for detecting stack-region corruption
pub const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

/// ============================================================================
/// Policy
/// ============================================================================

/// Priority policy selected at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedPolicy {
    /// Strict priority with donation (default)
    #[default]
    Priority,
    /// Multi-level feedback queue scheduler
    Mlfqs,
}

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Priority policy
    pub policy: SchedPolicy,
    /// Quantum length in ticks
    pub time_slice: u32,
    /// Timer interrupts per second (MLFQS once-per-second cadence)
    pub timer_freq: i64,
    /// Maximum number of live TCBs
    pub max_threads: usize,
    /// Maximum donation chain depth
    pub donation_depth: usize,
}

impl SchedConfig {
    /// Create the default configuration
    pub const fn new() -> Self {
        Self {
            policy: SchedPolicy::Priority,
            time_slice: TIME_SLICE,
            timer_freq: TIMER_FREQ,
            max_threads: MAX_THREADS,
            donation_depth: DONATION_DEPTH,
        }
    }

    /// Default configuration with the MLFQS policy
    pub const fn mlfqs() -> Self {
        let mut config = Self::new();
        config.policy = SchedPolicy::Mlfqs;
        config
    }

    /// Build a configuration from the kernel command line
    ///
    /// `-o mlfqs` (or the older `-mlfqs`) selects the MLFQS policy; every
    /// other option is left for the rest of the kernel.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::new();
        let mut words = cmdline.split_whitespace();

        while let Some(word) = words.next() {
            let selects_mlfqs = match word {
                "-mlfqs" => true,
                "-o" => words.next() == Some("mlfqs"),
                _ => false,
            };
            if selects_mlfqs {
                config.policy = SchedPolicy::Mlfqs;
            }
        }

        config
    }

    /// Check whether the MLFQS policy is active
    pub const fn is_mlfqs(&self) -> bool {
        matches!(self.policy, SchedPolicy::Mlfqs)
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp a priority into `[PRI_MIN, PRI_MAX]`
pub const fn clamp_priority(priority: i32) -> i32 {
    if priority < PRI_MIN {
        PRI_MIN
    } else if priority > PRI_MAX {
        PRI_MAX
    } else {
        priority
    }
}

/// Clamp a nice value into `[NICE_MIN, NICE_MAX]`
pub const fn clamp_nice(nice: i32) -> i32 {
    if nice < NICE_MIN {
        NICE_MIN
    } else if nice > NICE_MAX {
        NICE_MAX
    } else {
        nice
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = SchedConfig::default();
        assert_eq!(config.policy, SchedPolicy::Priority);
        assert_eq!(config.time_slice, TIME_SLICE);
        assert!(!config.is_mlfqs());
    }

    #[test]
    fn test_cmdline_selects_mlfqs() {
        assert!(SchedConfig::from_cmdline("-q -o mlfqs run alarm-multiple").is_mlfqs());
        assert!(SchedConfig::from_cmdline("-mlfqs").is_mlfqs());
        assert!(!SchedConfig::from_cmdline("-q run priority-donate-one").is_mlfqs());
        assert!(!SchedConfig::from_cmdline("-o").is_mlfqs());
        assert!(!SchedConfig::from_cmdline("").is_mlfqs());
    }

    #[test]
    fn test_clamping() {
        assert_eq!(clamp_priority(-5), PRI_MIN);
        assert_eq!(clamp_priority(100), PRI_MAX);
        assert_eq!(clamp_priority(40), 40);
        assert_eq!(clamp_nice(-21), NICE_MIN);
        assert_eq!(clamp_nice(21), NICE_MAX);
        assert_eq!(clamp_nice(3), 3);
    }
}
