//! Exact rational arithmetic for the sweep-line intersector.
//!
//! # Precision guarantees
//!
//! [`Rational`] stores a normalized `i128` fraction. The intersector only ever
//! builds values of three shapes from integer input coordinates `|c| <= MAX_COORDINATE`:
//!
//! - input endpoints (denominator 1),
//! - intersection points of two input lines (denominator `|cross(r, s)| <= 2^35`,
//!   numerator `<= 2^53`),
//! - the Y of an input line at such an X (denominator `<= 2^52`, numerator `<= 2^71`).
//!
//! Every comparison cross-multiplies two of these, which stays below `2^107`.
//! That leaves headroom under `i128::MAX`, so all sweep decisions are exact.
//! Inputs outside the coordinate bound are rejected before the sweep starts.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use bevy::math::DVec2;

/// Largest absolute input coordinate for which the sweep stays exact.
pub const MAX_COORDINATE: i64 = 1 << 16;

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// A normalized fraction `num / den` with `den > 0` and `gcd(num, den) == 1`.
///
/// Normalization keeps the derived `Eq` and `Hash` consistent with `Ord`, so
/// rationals (and points made of them) can key ordered and hashed maps.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i128,
    den: i128,
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Build and normalize `num / den`.
    ///
    /// A zero denominator is a programming error; in release builds it
    /// collapses to zero rather than poisoning later comparisons.
    pub fn new(num: i128, den: i128) -> Self {
        debug_assert!(den != 0, "rational with zero denominator");
        if den == 0 {
            return Self::ZERO;
        }
        let g = gcd(num, den);
        let sign = if den < 0 { -1 } else { 1 };
        Self {
            num: sign * num / g,
            den: sign * den / g,
        }
    }

    pub const fn from_int(value: i64) -> Self {
        Self {
            num: value as i128,
            den: 1,
        }
    }

    pub fn numer(&self) -> i128 {
        self.num
    }

    pub fn denom(&self) -> i128 {
        self.den
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::from_int(value)
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num * other.den).cmp(&(other.num * self.den))
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for Rational {
    type Output = Rational;
    fn add(self, rhs: Rational) -> Rational {
        if self.den == rhs.den {
            return Rational::new(self.num + rhs.num, self.den);
        }
        Rational::new(self.num * rhs.den + rhs.num * self.den, self.den * rhs.den)
    }
}

impl Sub for Rational {
    type Output = Rational;
    fn sub(self, rhs: Rational) -> Rational {
        self + (-rhs)
    }
}

impl Neg for Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational {
            num: -self.num,
            den: self.den,
        }
    }
}

impl Mul for Rational {
    type Output = Rational;
    fn mul(self, rhs: Rational) -> Rational {
        // Cross-reduce first to keep intermediates small
        let g1 = gcd(self.num, rhs.den).max(1);
        let g2 = gcd(rhs.num, self.den).max(1);
        Rational::new(
            (self.num / g1) * (rhs.num / g2),
            (self.den / g2) * (rhs.den / g1),
        )
    }
}

impl Mul<i64> for Rational {
    type Output = Rational;
    fn mul(self, rhs: i64) -> Rational {
        self * Rational::from_int(rhs)
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A point with exact rational coordinates, ordered by `(x, y)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RationalPoint {
    pub x: Rational,
    pub y: Rational,
}

impl RationalPoint {
    pub const fn new(x: Rational, y: Rational) -> Self {
        Self { x, y }
    }

    pub const fn from_int(x: i64, y: i64) -> Self {
        Self {
            x: Rational::from_int(x),
            y: Rational::from_int(y),
        }
    }

    pub fn to_dvec2(&self) -> DVec2 {
        DVec2::new(self.x.to_f64(), self.y.to_f64())
    }
}
