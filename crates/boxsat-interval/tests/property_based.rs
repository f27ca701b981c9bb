//! Property-based tests: interval operations enclose their pointwise
//! counterparts, and bisection partitions a box.

use boxsat_interval::{Interval, IntervalBox};
use boxsat_symbolic::Variable;
use proptest::prelude::*;

fn interval_strategy() -> impl Strategy<Value = Interval> {
    (-100.0f64..100.0, -100.0f64..100.0)
        .prop_map(|(a, b)| Interval::new(a.min(b), a.max(b)))
}

/// A point inside an interval, by convex combination.
fn pick(iv: Interval, t: f64) -> f64 {
    iv.lb() + (iv.ub() - iv.lb()) * t
}

proptest! {
    #[test]
    fn arithmetic_encloses_pointwise_results(
        a in interval_strategy(),
        b in interval_strategy(),
        s in 0.0f64..=1.0,
        t in 0.0f64..=1.0,
    ) {
        let x = pick(a, s);
        let y = pick(b, t);
        prop_assert!((a + b).contains(x + y));
        prop_assert!((a - b).contains(x - y));
        prop_assert!((a * b).contains(x * y));
        if y != 0.0 {
            prop_assert!((a / b).contains(x / y));
        }
        prop_assert!(a.sqr().contains(x * x));
        prop_assert!(a.abs().contains(x.abs()));
        prop_assert!(a.min(b).contains(x.min(y)));
        prop_assert!(a.max(b).contains(x.max(y)));
    }

    #[test]
    fn transcendentals_enclose_pointwise_results(
        a in interval_strategy(),
        s in 0.0f64..=1.0,
    ) {
        let x = pick(a, s);
        prop_assert!(a.sin().contains(x.sin()));
        prop_assert!(a.cos().contains(x.cos()));
        prop_assert!(a.exp().contains(x.exp()));
        prop_assert!(a.atan().contains(x.atan()));
        prop_assert!(a.sinh().contains(x.sinh()));
        prop_assert!(a.cosh().contains(x.cosh()));
        prop_assert!(a.tanh().contains(x.tanh()));
        if x > 0.0 {
            prop_assert!(a.log().contains(x.ln()));
            prop_assert!(a.sqrt().contains(x.sqrt()));
        }
        if (-1.0..=1.0).contains(&x) {
            prop_assert!(a.asin().contains(x.asin()));
            prop_assert!(a.acos().contains(x.acos()));
        }
    }

    #[test]
    fn powers_enclose_pointwise_results(
        a in interval_strategy(),
        s in 0.0f64..=1.0,
        n in 1i32..=6,
    ) {
        let x = pick(a, s);
        prop_assert!(a.powi(n).contains(x.powi(n)));
    }

    #[test]
    fn bisection_partitions_the_interval(
        a in interval_strategy(),
        s in 0.0f64..=1.0,
    ) {
        prop_assume!(a.is_bisectable());
        let (l, r) = a.bisect();
        prop_assert_eq!(l.ub(), r.lb());
        prop_assert_eq!(l.hull(r), a);
        let x = pick(a, s);
        prop_assert!(l.contains(x) || r.contains(x));
    }

    #[test]
    fn box_bisection_partitions_the_box(
        lo in -10.0f64..0.0,
        hi in 0.1f64..10.0,
        s in 0.0f64..=1.0,
    ) {
        let v = Variable::continuous("x");
        let w = Variable::continuous("y");
        let bx = IntervalBox::new([
            (v, Interval::new(lo, hi)),
            (w, Interval::new(0.0, 1.0)),
        ]);
        let (l, r) = bx.bisect(0);
        // The halves differ only in the bisected dimension and share only
        // the midpoint hyperplane.
        prop_assert_eq!(l.get(1), bx.get(1));
        prop_assert_eq!(r.get(1), bx.get(1));
        prop_assert_eq!(l.get(0).ub(), r.get(0).lb());
        prop_assert_eq!(l.get(0).hull(r.get(0)), bx.get(0));
        let x = pick(bx.get(0), s);
        prop_assert!(l.get(0).contains(x) || r.get(0).contains(x));
    }
}
