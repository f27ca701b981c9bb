//! Closed f64 intervals with outward rounding.
//!
//! Primitive operations compute with round-to-nearest and then widen the
//! result outward by one ULP (two for the libm-backed transcendentals), so
//! every operation encloses its exact real counterpart. The empty interval is
//! canonically `[+∞, −∞]`; constructors normalise NaN inputs to empty.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

#[inline]
fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        // Smallest positive subnormal.
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x.is_sign_positive() {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

#[inline]
fn next_down(x: f64) -> f64 {
    if x.is_nan() || x == f64::NEG_INFINITY {
        return x;
    }
    if x == 0.0 {
        // Smallest negative subnormal.
        return f64::from_bits(0x8000_0000_0000_0001);
    }
    let bits = x.to_bits();
    if x.is_sign_positive() {
        f64::from_bits(bits - 1)
    } else {
        f64::from_bits(bits + 1)
    }
}

// Transcendentals from libm are within 1 ULP of exact; two steps cover them.
#[inline]
fn up2(x: f64) -> f64 {
    next_up(next_up(x))
}

#[inline]
fn down2(x: f64) -> f64 {
    next_down(next_down(x))
}

/// `x·y` with the interval-arithmetic convention `0 · ±∞ = 0`.
#[inline]
fn prod(x: f64, y: f64) -> f64 {
    if x == 0.0 || y == 0.0 {
        0.0
    } else {
        x * y
    }
}

/// Whether some `offset + k·period` (k integer) falls inside `[lb, ub]`.
/// Biased toward inclusion: a false positive only widens an enclosure.
fn contains_translate(lb: f64, ub: f64, period: f64, offset: f64) -> bool {
    let slack = f64::EPSILON * 8.0 * lb.abs().max(ub.abs()).max(1.0);
    let k = ((lb - offset) / period).ceil();
    offset + k * period <= ub + slack
}

/// A closed interval `[lb, ub] ⊆ ℝ ∪ {±∞}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    lb: f64,
    ub: f64,
}

impl Interval {
    pub const EMPTY: Interval = Interval {
        lb: f64::INFINITY,
        ub: f64::NEG_INFINITY,
    };

    pub const ENTIRE: Interval = Interval {
        lb: f64::NEG_INFINITY,
        ub: f64::INFINITY,
    };

    /// `[lb, ub]`; empty when `lb > ub`, either bound is NaN, or the interval
    /// degenerates to a single infinity.
    #[inline]
    pub fn new(lb: f64, ub: f64) -> Interval {
        if lb.is_nan() || ub.is_nan() || lb > ub || lb == f64::INFINITY || ub == f64::NEG_INFINITY
        {
            return Interval::EMPTY;
        }
        Interval { lb, ub }
    }

    /// The degenerate interval `[v, v]`.
    #[inline]
    pub fn point(v: f64) -> Interval {
        Interval::new(v, v)
    }

    #[inline]
    pub fn lb(self) -> f64 {
        self.lb
    }

    #[inline]
    pub fn ub(self) -> f64 {
        self.ub
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.lb > self.ub
    }

    #[inline]
    pub fn is_degenerate(self) -> bool {
        self.lb == self.ub
    }

    /// Diameter `ub − lb`; 0 for the empty interval.
    #[inline]
    pub fn diam(self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.ub - self.lb
        }
    }

    /// A finite midpoint, clamped into the interval. Half-infinite intervals
    /// yield the extreme finite value on the unbounded side.
    pub fn mid(self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        if self.lb == f64::NEG_INFINITY {
            if self.ub == f64::INFINITY {
                return 0.0;
            }
            return -f64::MAX;
        }
        if self.ub == f64::INFINITY {
            return f64::MAX;
        }
        (self.lb * 0.5 + self.ub * 0.5).clamp(self.lb, self.ub)
    }

    /// Whether bisection at the midpoint produces two strictly smaller parts.
    pub fn is_bisectable(self) -> bool {
        if self.is_empty() {
            return false;
        }
        let m = self.mid();
        self.lb < m && m < self.ub
    }

    /// Split at the midpoint.
    pub fn bisect(self) -> (Interval, Interval) {
        self.bisect_at(self.mid())
    }

    /// Split at `p`, which must lie inside the interval.
    pub fn bisect_at(self, p: f64) -> (Interval, Interval) {
        debug_assert!(self.contains(p), "bisection point {p} outside {self}");
        (Interval::new(self.lb, p), Interval::new(p, self.ub))
    }

    #[inline]
    pub fn contains(self, v: f64) -> bool {
        self.lb <= v && v <= self.ub
    }

    #[inline]
    pub fn is_subset(self, other: Interval) -> bool {
        self.is_empty() || (other.lb <= self.lb && self.ub <= other.ub)
    }

    #[inline]
    pub fn intersect(self, other: Interval) -> Interval {
        Interval::new(self.lb.max(other.lb), self.ub.min(other.ub))
    }

    /// Convex hull of both intervals.
    #[inline]
    pub fn hull(self, other: Interval) -> Interval {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Interval::new(self.lb.min(other.lb), self.ub.max(other.ub))
    }

    // ------------------------------------------------------------------
    // Elementary functions
    // ------------------------------------------------------------------

    pub fn abs(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if self.lb >= 0.0 {
            self
        } else if self.ub <= 0.0 {
            -self
        } else {
            Interval::new(0.0, (-self.lb).max(self.ub))
        }
    }

    pub fn min(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(self.lb.min(other.lb), self.ub.min(other.ub))
    }

    pub fn max(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(self.lb.max(other.lb), self.ub.max(other.ub))
    }

    pub fn sqr(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        let (a, b) = (self.lb.abs(), self.ub.abs());
        let hi = next_up(a.max(b) * a.max(b));
        let lo = if self.contains(0.0) {
            0.0
        } else {
            let m = a.min(b);
            next_down(m * m).max(0.0)
        };
        Interval::new(lo, hi)
    }

    /// Integer power.
    pub fn powi(self, n: i32) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if n == 0 {
            return Interval::point(1.0);
        }
        if n < 0 {
            return Interval::point(1.0) / self.powi(-n);
        }
        if n % 2 == 1 {
            // Odd powers are monotone.
            Interval::new(next_down(self.lb.powi(n)), next_up(self.ub.powi(n)))
        } else {
            let (a, b) = (self.lb.abs(), self.ub.abs());
            let hi = next_up(a.max(b).powi(n));
            let lo = if self.contains(0.0) {
                0.0
            } else {
                next_down(a.min(b).powi(n)).max(0.0)
            };
            Interval::new(lo, hi)
        }
    }

    /// Real power with a point exponent; non-integer exponents restrict the
    /// base to `[0, ∞)`.
    pub fn pow_point(self, p: f64) -> Interval {
        if p.fract() == 0.0 && p.abs() <= i32::MAX as f64 {
            return self.powi(p as i32);
        }
        let xe = self.intersect(Interval::new(0.0, f64::INFINITY));
        if xe.is_empty() {
            return Interval::EMPTY;
        }
        let (a, b) = (xe.lb.powf(p), xe.ub.powf(p));
        if p >= 0.0 {
            Interval::new(down2(a).max(0.0), up2(b))
        } else {
            Interval::new(down2(b).max(0.0), up2(a))
        }
    }

    /// Real power with an interval exponent, `xʸ = exp(y·log x)` on `x ≥ 0`.
    pub fn pow(self, e: Interval) -> Interval {
        if e.is_empty() {
            return Interval::EMPTY;
        }
        if e.is_degenerate() {
            return self.pow_point(e.lb);
        }
        let xe = self.intersect(Interval::new(0.0, f64::INFINITY));
        if xe.is_empty() {
            return Interval::EMPTY;
        }
        (e * xe.log()).exp()
    }

    /// Principal inverse of an integer power: the tightest `r ⊇ {y ≥ 0 : yⁿ ∈
    /// self}` for even `n`, the signed monotone root for odd `n`.
    pub fn root(self, n: i32) -> Interval {
        debug_assert!(n >= 1);
        if self.is_empty() {
            return Interval::EMPTY;
        }
        let inv = 1.0 / f64::from(n);
        if n % 2 == 0 {
            let xe = self.intersect(Interval::new(0.0, f64::INFINITY));
            if xe.is_empty() {
                return Interval::EMPTY;
            }
            Interval::new(down2(xe.lb.powf(inv)).max(0.0), up2(xe.ub.powf(inv)))
        } else {
            let signed = |v: f64| v.signum() * v.abs().powf(inv);
            Interval::new(down2(signed(self.lb)), up2(signed(self.ub)))
        }
    }

    pub fn sqrt(self) -> Interval {
        if self.is_empty() || self.ub < 0.0 {
            return Interval::EMPTY;
        }
        let lo = if self.lb <= 0.0 {
            0.0
        } else {
            next_down(self.lb.sqrt()).max(0.0)
        };
        Interval::new(lo, next_up(self.ub.sqrt()))
    }

    pub fn exp(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(down2(self.lb.exp()).max(0.0), up2(self.ub.exp()))
    }

    /// Natural log on the domain `[0, ∞)`; `log [0, b] = [−∞, log b]`.
    pub fn log(self) -> Interval {
        if self.is_empty() || self.ub <= 0.0 {
            return Interval::EMPTY;
        }
        let lo = if self.lb <= 0.0 {
            f64::NEG_INFINITY
        } else {
            down2(self.lb.ln())
        };
        Interval::new(lo, up2(self.ub.ln()))
    }

    pub fn sin(self) -> Interval {
        use std::f64::consts::{FRAC_PI_2, TAU};
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if !self.lb.is_finite() || !self.ub.is_finite() || self.diam() >= TAU {
            return Interval::new(-1.0, 1.0);
        }
        let (slb, sub) = (self.lb.sin(), self.ub.sin());
        let hi = if contains_translate(self.lb, self.ub, TAU, FRAC_PI_2) {
            1.0
        } else {
            up2(slb.max(sub)).min(1.0)
        };
        let lo = if contains_translate(self.lb, self.ub, TAU, -FRAC_PI_2) {
            -1.0
        } else {
            down2(slb.min(sub)).max(-1.0)
        };
        Interval::new(lo, hi)
    }

    pub fn cos(self) -> Interval {
        use std::f64::consts::{PI, TAU};
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if !self.lb.is_finite() || !self.ub.is_finite() || self.diam() >= TAU {
            return Interval::new(-1.0, 1.0);
        }
        let (clb, cub) = (self.lb.cos(), self.ub.cos());
        let hi = if contains_translate(self.lb, self.ub, TAU, 0.0) {
            1.0
        } else {
            up2(clb.max(cub)).min(1.0)
        };
        let lo = if contains_translate(self.lb, self.ub, TAU, PI) {
            -1.0
        } else {
            down2(clb.min(cub)).max(-1.0)
        };
        Interval::new(lo, hi)
    }

    pub fn tan(self) -> Interval {
        use std::f64::consts::{FRAC_PI_2, PI};
        if self.is_empty() {
            return Interval::EMPTY;
        }
        if !self.lb.is_finite()
            || !self.ub.is_finite()
            || self.diam() >= PI
            || contains_translate(self.lb, self.ub, PI, FRAC_PI_2)
        {
            // Spans an asymptote.
            return Interval::ENTIRE;
        }
        Interval::new(down2(self.lb.tan()), up2(self.ub.tan()))
    }

    pub fn asin(self) -> Interval {
        let xe = self.intersect(Interval::new(-1.0, 1.0));
        if xe.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(down2(xe.lb.asin()), up2(xe.ub.asin()))
    }

    pub fn acos(self) -> Interval {
        let xe = self.intersect(Interval::new(-1.0, 1.0));
        if xe.is_empty() {
            return Interval::EMPTY;
        }
        // acos is decreasing.
        Interval::new(down2(xe.ub.acos()).max(0.0), up2(xe.lb.acos()))
    }

    pub fn atan(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(down2(self.lb.atan()), up2(self.ub.atan()))
    }

    /// `atan2(self, x)`; corner evaluation on the continuous half-plane
    /// `x > 0`, the full range otherwise.
    pub fn atan2(self, x: Interval) -> Interval {
        use std::f64::consts::PI;
        if self.is_empty() || x.is_empty() {
            return Interval::EMPTY;
        }
        if x.lb > 0.0 {
            let corners = [
                self.lb.atan2(x.lb),
                self.lb.atan2(x.ub),
                self.ub.atan2(x.lb),
                self.ub.atan2(x.ub),
            ];
            let lo = corners.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = corners.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            return Interval::new(down2(lo), up2(hi));
        }
        Interval::new(down2(-PI), up2(PI))
    }

    pub fn sinh(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(down2(self.lb.sinh()), up2(self.ub.sinh()))
    }

    pub fn cosh(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        let (a, b) = (self.lb.abs(), self.ub.abs());
        let hi = up2(a.max(b).cosh());
        let lo = if self.contains(0.0) {
            1.0
        } else {
            down2(a.min(b).cosh()).max(1.0)
        };
        Interval::new(lo, hi)
    }

    pub fn tanh(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(down2(self.lb.tanh()).max(-1.0), up2(self.ub.tanh()).min(1.0))
    }

    pub fn asinh(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(down2(self.lb.asinh()), up2(self.ub.asinh()))
    }

    /// Principal (non-negative) inverse of cosh, on the domain `[1, ∞)`.
    pub fn acosh(self) -> Interval {
        let xe = self.intersect(Interval::new(1.0, f64::INFINITY));
        if xe.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(down2(xe.lb.acosh()).max(0.0), up2(xe.ub.acosh()))
    }

    pub fn atanh(self) -> Interval {
        let xe = self.intersect(Interval::new(-1.0, 1.0));
        if xe.is_empty() {
            return Interval::EMPTY;
        }
        let lo = if xe.lb <= -1.0 {
            f64::NEG_INFINITY
        } else {
            down2(xe.lb.atanh())
        };
        let hi = if xe.ub >= 1.0 {
            f64::INFINITY
        } else {
            up2(xe.ub.atanh())
        };
        Interval::new(lo, hi)
    }
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(next_down(self.lb + rhs.lb), next_up(self.ub + rhs.ub))
    }
}

impl Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        Interval::new(next_down(self.lb - rhs.ub), next_up(self.ub - rhs.lb))
    }
}

impl Neg for Interval {
    type Output = Interval;

    fn neg(self) -> Interval {
        if self.is_empty() {
            return Interval::EMPTY;
        }
        Interval {
            lb: -self.ub,
            ub: -self.lb,
        }
    }
}

impl Mul for Interval {
    type Output = Interval;

    fn mul(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        let candidates = [
            prod(self.lb, rhs.lb),
            prod(self.lb, rhs.ub),
            prod(self.ub, rhs.lb),
            prod(self.ub, rhs.ub),
        ];
        let lo = candidates.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = candidates.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Interval::new(next_down(lo), next_up(hi))
    }
}

impl Div for Interval {
    type Output = Interval;

    fn div(self, rhs: Interval) -> Interval {
        if self.is_empty() || rhs.is_empty() {
            return Interval::EMPTY;
        }
        if rhs.lb > 0.0 || rhs.ub < 0.0 {
            let candidates = [
                self.lb / rhs.lb,
                self.lb / rhs.ub,
                self.ub / rhs.lb,
                self.ub / rhs.ub,
            ];
            let lo = candidates.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = candidates.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            return Interval::new(next_down(lo), next_up(hi));
        }
        if rhs.lb == 0.0 && rhs.ub == 0.0 {
            return Interval::EMPTY;
        }
        if rhs.lb == 0.0 {
            // Divisor in [0, b], b > 0.
            if self.lb > 0.0 {
                return Interval::new(next_down(self.lb / rhs.ub), f64::INFINITY);
            }
            if self.ub < 0.0 {
                return Interval::new(f64::NEG_INFINITY, next_up(self.ub / rhs.ub));
            }
            return Interval::ENTIRE;
        }
        if rhs.ub == 0.0 {
            // Divisor in [a, 0], a < 0.
            if self.lb > 0.0 {
                return Interval::new(f64::NEG_INFINITY, next_up(self.lb / rhs.lb));
            }
            if self.ub < 0.0 {
                return Interval::new(next_down(self.ub / rhs.lb), f64::INFINITY);
            }
            return Interval::ENTIRE;
        }
        // Divisor straddles zero: the two unbounded pieces hull to ℝ.
        Interval::ENTIRE
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "empty")
        } else {
            write!(f, "[{}, {}]", self.lb, self.ub)
        }
    }
}
