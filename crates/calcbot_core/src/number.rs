//! Numeric coefficients for expressions.
//!
//! Numbers are exact rationals while the arithmetic stays inside `i64`,
//! and fall back to floating point on overflow or whenever a float is
//! involved.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Greatest common divisor using Euclidean algorithm
fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Exact integer square root, if `n` is a perfect square.
fn exact_isqrt(n: i64) -> Option<i64> {
    if n < 0 {
        return None;
    }
    let guess = (n as f64).sqrt().round() as i64;
    (guess.saturating_sub(1)..=guess.saturating_add(1))
        .find(|r| *r >= 0 && r.checked_mul(*r) == Some(n))
}

/// A number appearing in an expression.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// Exact rational (numerator, denominator)
    /// Invariant: denominator > 0, gcd(num, den) == 1
    Rational(i64, i64),
    /// Floating-point value
    Float(f64),
}

impl Number {
    pub const ZERO: Number = Number::Rational(0, 1);
    pub const ONE: Number = Number::Rational(1, 1);
    pub const MINUS_ONE: Number = Number::Rational(-1, 1);
    pub const HALF: Number = Number::Rational(1, 2);

    /// Create an integer number
    pub fn int(n: i64) -> Self {
        Number::Rational(n, 1)
    }

    /// Create a reduced rational. A zero denominator yields a float infinity.
    pub fn rational(num: i64, den: i64) -> Self {
        Self::from_i128(num as i128, den as i128)
    }

    fn from_i128(num: i128, den: i128) -> Self {
        if den == 0 {
            return Number::Float(if num >= 0 {
                f64::INFINITY
            } else {
                f64::NEG_INFINITY
            });
        }
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        let g = gcd(num, den).max(1);
        let (num, den) = (num / g, den / g);
        match (i64::try_from(num), i64::try_from(den)) {
            (Ok(n), Ok(d)) => Number::Rational(n, d),
            _ => Number::Float(num as f64 / den as f64),
        }
    }

    pub fn float(f: f64) -> Self {
        Number::Float(f)
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Rational(n, _) => *n == 0,
            Number::Float(f) => *f == 0.0,
        }
    }

    /// Exactly one. A float `1.0` is not the multiplicative identity here.
    pub fn is_one(&self) -> bool {
        matches!(self, Number::Rational(1, 1))
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Number::Rational(n, _) => *n < 0,
            Number::Float(f) => *f < 0.0,
        }
    }

    pub fn is_positive(&self) -> bool {
        match self {
            Number::Rational(n, _) => *n > 0,
            Number::Float(f) => *f > 0.0,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Number::Rational(..))
    }

    /// Integer value of an exact integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Number::Rational(n, 1) => Some(*n),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Rational(n, d) => *n as f64 / *d as f64,
            Number::Float(f) => *f,
        }
    }

    pub fn abs(&self) -> Self {
        if self.is_negative() {
            -*self
        } else {
            *self
        }
    }

    /// Multiplicative inverse. Zero maps to infinity.
    pub fn recip(&self) -> Self {
        match self {
            Number::Rational(n, d) => Self::rational(*d, *n),
            Number::Float(f) => Number::Float(1.0 / f),
        }
    }

    /// Raise to another number.
    ///
    /// Returns `None` when the result cannot be represented as a real
    /// number of the right kind: an irrational root of an exact value,
    /// a negative base under a fractional exponent, or division by zero.
    pub fn pow(&self, exp: &Number) -> Option<Number> {
        match (self, exp) {
            (Number::Rational(..), Number::Rational(p, 1)) => self.pow_int(*p),
            (Number::Rational(n, d), Number::Rational(p, 2)) => {
                let root = Number::Rational(exact_isqrt(*n)?, exact_isqrt(*d)?);
                root.pow_int(*p)
            }
            (Number::Rational(..), Number::Rational(..)) => None,
            _ => {
                let value = self.to_f64().powf(exp.to_f64());
                value.is_finite().then_some(Number::Float(value))
            }
        }
    }

    fn pow_int(&self, p: i64) -> Option<Number> {
        if self.is_zero() && p < 0 {
            return None;
        }
        let base = if p < 0 { self.recip() } else { *self };
        let p = p.unsigned_abs();
        if p > 64 {
            let value = base.to_f64().powf(p as f64);
            return value.is_finite().then_some(Number::Float(value));
        }
        let mut acc = Number::ONE;
        for _ in 0..p {
            acc = acc * base;
        }
        Some(acc)
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Number::Rational(..) => 0,
            Number::Float(_) => 1,
        }
    }
}

impl Add for Number {
    type Output = Number;
    fn add(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Rational(a, b), Number::Rational(c, d)) => Number::from_i128(
                a as i128 * d as i128 + c as i128 * b as i128,
                b as i128 * d as i128,
            ),
            _ => Number::Float(self.to_f64() + rhs.to_f64()),
        }
    }
}

impl Sub for Number {
    type Output = Number;
    fn sub(self, rhs: Number) -> Number {
        self + (-rhs)
    }
}

impl Mul for Number {
    type Output = Number;
    fn mul(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Rational(a, b), Number::Rational(c, d)) => {
                Number::from_i128(a as i128 * c as i128, b as i128 * d as i128)
            }
            _ => Number::Float(self.to_f64() * rhs.to_f64()),
        }
    }
}

impl Div for Number {
    type Output = Number;
    fn div(self, rhs: Number) -> Number {
        self * rhs.recip()
    }
}

impl Neg for Number {
    type Output = Number;
    fn neg(self) -> Number {
        match self {
            Number::Rational(n, d) => Number::from_i128(-(n as i128), d as i128),
            Number::Float(f) => Number::Float(-f),
        }
    }
}

// Exact and float numbers never compare equal: `1` and `1.0` are distinct
// expressions, matching how they print.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Number::Rational(a, b), Number::Rational(c, d)) => {
                (*a as i128 * *d as i128).cmp(&(*c as i128 * *b as i128))
            }
            (Number::Float(a), Number::Float(b)) => a.total_cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::int(n)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Rational(n, 1) => write!(f, "{}", n),
            Number::Rational(n, d) => write!(f, "{}/{}", n, d),
            // Debug keeps a trailing `.0` so floats re-parse as floats
            Number::Float(x) => write!(f, "{:?}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_reduces() {
        assert_eq!(Number::rational(6, -4), Number::Rational(-3, 2));
        assert_eq!(Number::rational(0, 5), Number::ZERO);
    }

    #[test]
    fn test_arithmetic_stays_exact() {
        let third = Number::rational(1, 3);
        assert_eq!(third + third + third, Number::ONE);
        assert_eq!(third * Number::int(3), Number::ONE);
        assert_eq!(Number::int(2) / Number::int(4), Number::HALF);
    }

    #[test]
    fn test_overflow_degrades_to_float() {
        let big = Number::int(i64::MAX);
        assert!(!(big * big).is_exact());
    }

    #[test]
    fn test_float_contaminates() {
        let sum = Number::int(1) + Number::float(0.5);
        assert_eq!(sum, Number::float(1.5));
        assert_ne!(Number::float(1.0), Number::ONE);
    }

    #[test]
    fn test_pow() {
        assert_eq!(Number::int(2).pow(&Number::int(10)), Some(Number::int(1024)));
        assert_eq!(Number::int(2).pow(&Number::int(-1)), Some(Number::HALF));
        assert_eq!(
            Number::rational(9, 4).pow(&Number::HALF),
            Some(Number::rational(3, 2))
        );
        assert_eq!(Number::int(2).pow(&Number::HALF), None);
        assert_eq!(Number::int(-4).pow(&Number::HALF), None);
        assert_eq!(Number::ZERO.pow(&Number::MINUS_ONE), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Number::int(-7).to_string(), "-7");
        assert_eq!(Number::rational(1, 3).to_string(), "1/3");
        assert_eq!(Number::float(2.0).to_string(), "2.0");
    }
}
