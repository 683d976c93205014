//! A simple closed interval used to propagate the declared bounds of columns
//! through arithmetic expressions.

use serde::{Deserialize, Serialize};
use std::{fmt, ops};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    lower: f64,
    upper: f64,
}

impl Interval {
    /// Build an interval, bounds are reordered if needed
    pub fn new(lower: f64, upper: f64) -> Self {
        if lower <= upper {
            Interval { lower, upper }
        } else {
            Interval {
                lower: upper,
                upper: lower,
            }
        }
    }

    pub fn value(value: f64) -> Self {
        Interval::new(value, value)
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// `upper - lower`
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn union(&self, other: &Interval) -> Interval {
        Interval::new(self.lower.min(other.lower), self.upper.max(other.upper))
    }

    fn from_points<I: IntoIterator<Item = f64>>(points: I) -> Interval {
        let (lower, upper) = points
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(l, u), p| {
                (l.min(p), u.max(p))
            });
        Interval::new(lower, upper)
    }

    /// `None` when the denominator may be 0
    pub fn checked_div(&self, other: &Interval) -> Option<Interval> {
        if other.contains(0.) {
            None
        } else {
            Some(Interval::from_points([
                self.lower / other.lower,
                self.lower / other.upper,
                self.upper / other.lower,
                self.upper / other.upper,
            ]))
        }
    }

    pub fn abs(&self) -> Interval {
        if self.contains(0.) {
            Interval::new(0., self.lower.abs().max(self.upper.abs()))
        } else {
            Interval::from_points([self.lower.abs(), self.upper.abs()])
        }
    }

    /// `None` when the interval has negative values
    pub fn sqrt(&self) -> Option<Interval> {
        (self.lower >= 0.).then(|| Interval::new(self.lower.sqrt(), self.upper.sqrt()))
    }

    pub fn map_monotonic<F: Fn(f64) -> f64>(&self, f: F) -> Interval {
        Interval::new(f(self.lower), f(self.upper))
    }
}

impl ops::Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Self) -> Self::Output {
        Interval::new(self.lower + rhs.lower, self.upper + rhs.upper)
    }
}

impl ops::Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Self) -> Self::Output {
        Interval::new(self.lower - rhs.upper, self.upper - rhs.lower)
    }
}

impl ops::Mul for Interval {
    type Output = Interval;

    fn mul(self, rhs: Self) -> Self::Output {
        Interval::from_points([
            self.lower * rhs.lower,
            self.lower * rhs.upper,
            self.upper * rhs.lower,
            self.upper * rhs.upper,
        ])
    }
}

impl ops::Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Self::Output {
        Interval::new(-self.upper, -self.lower)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}
