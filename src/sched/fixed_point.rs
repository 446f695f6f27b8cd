// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! 17.14 fixed-point arithmetic
//!
//! The kernel does no floating point, so the MLFQS load average and
//! recent-CPU values are kept as signed 32-bit numbers with 14 fractional
//! bits. Products and quotients are widened to 64 bits before rescaling.

use core::ops::{Add, Div, Mul, Sub};

/// Number of fractional bits
pub const FRACTION_BITS: u32 = 14;

/// Scale factor, 1.0 in fixed point
const F: i32 = 1 << FRACTION_BITS;

/// Signed 17.14 fixed-point number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fixed(i32);

impl Fixed {
    /// 0.0
    pub const ZERO: Self = Self(0);

    /// 1.0
    pub const ONE: Self = Self(F);

    /// Convert an integer
    pub const fn from_int(n: i32) -> Self {
        Self(n * F)
    }

    /// The fraction `num / den`
    pub const fn ratio(num: i32, den: i32) -> Self {
        Self((((num as i64) << FRACTION_BITS) / den as i64) as i32)
    }

    /// Raw representation
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Convert to an integer, rounding toward zero
    pub const fn to_int_trunc(self) -> i32 {
        self.0 / F
    }

    /// Convert to an integer, rounding to nearest
    pub const fn to_int_round(self) -> i32 {
        if self.0 >= 0 {
            (self.0 + F / 2) / F
        } else {
            (self.0 - F / 2) / F
        }
    }
}

impl Add for Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Add<i32> for Fixed {
    type Output = Self;

    fn add(self, rhs: i32) -> Self {
        Self(self.0 + rhs * F)
    }
}

impl Sub for Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Sub<i32> for Fixed {
    type Output = Self;

    fn sub(self, rhs: i32) -> Self {
        Self(self.0 - rhs * F)
    }
}

impl Mul for Fixed {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self(((self.0 as i64 * rhs.0 as i64) >> FRACTION_BITS) as i32)
    }
}

impl Mul<i32> for Fixed {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self(self.0 * rhs)
    }
}

impl Div for Fixed {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self((((self.0 as i64) << FRACTION_BITS) / rhs.0 as i64) as i32)
    }
}

impl Div<i32> for Fixed {
    type Output = Self;

    fn div(self, rhs: i32) -> Self {
        Self(self.0 / rhs)
    }
}
