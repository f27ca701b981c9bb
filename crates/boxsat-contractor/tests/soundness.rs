//! Contraction soundness: pruning never discards a point that satisfies the
//! constraints, and always returns a sub-box of its input.

use boxsat_contractor::{Contractor, ContractorStatus};
use boxsat_interval::{Interval, IntervalBox};
use boxsat_symbolic::{Environment, Expression, Formula, Variable};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Shape {
    CircleLeq,
    CircleEq,
    LineLeq,
    ExpGeq,
    ProductEq,
}

fn formula(shape: Shape, x: &Variable, y: &Variable) -> Formula {
    let sq = |e| Expression::pow(e, Expression::constant(2.0));
    match shape {
        Shape::CircleLeq => Formula::leq(
            Expression::add(sq(Expression::variable(x)), sq(Expression::variable(y))),
            Expression::one(),
        ),
        Shape::CircleEq => Formula::eq(
            Expression::add(sq(Expression::variable(x)), sq(Expression::variable(y))),
            Expression::one(),
        ),
        Shape::LineLeq => Formula::leq(
            Expression::add(
                Expression::variable(x),
                Expression::mul(Expression::constant(2.0), Expression::variable(y)),
            ),
            Expression::constant(0.5),
        ),
        Shape::ExpGeq => Formula::geq(
            Expression::exp(Expression::variable(x)),
            Expression::add(Expression::variable(y), Expression::constant(2.0)),
        ),
        Shape::ProductEq => Formula::eq(
            Expression::mul(Expression::variable(x), Expression::variable(y)),
            Expression::one(),
        ),
    }
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    prop_oneof![
        Just(Shape::CircleLeq),
        Just(Shape::CircleEq),
        Just(Shape::LineLeq),
        Just(Shape::ExpGeq),
        Just(Shape::ProductEq),
    ]
}

fn prune_with(
    make: impl Fn(Formula, &IntervalBox) -> Contractor,
    shape: Shape,
    bounds: (f64, f64, f64, f64),
    sample: (f64, f64),
) -> Result<(), TestCaseError> {
    let (xl, xu, yl, yu) = bounds;
    let x = Variable::continuous("x");
    let y = Variable::continuous("y");
    let bx = IntervalBox::new([
        (x.clone(), Interval::new(xl.min(xu), xl.max(xu))),
        (y.clone(), Interval::new(yl.min(yu), yl.max(yu))),
    ]);
    let f = formula(shape, &x, &y);
    let contractor = make(f.clone(), &bx);

    let mut cs = ContractorStatus::new(bx.clone());
    contractor.prune(&mut cs, 0);

    // Contraction: the result is a sub-box of the input.
    for i in 0..bx.size() {
        prop_assert!(
            cs.box_ref().get(i).is_subset(bx.get(i)),
            "dimension {i} grew: {} -> {}",
            bx.get(i),
            cs.box_ref().get(i)
        );
    }

    // Soundness: a satisfying point of the input box survives the pruning.
    let (s, t) = sample;
    let px = bx.get(0).lb() + bx.get(0).diam() * s;
    let py = bx.get(1).lb() + bx.get(1).diam() * t;
    let mut env = Environment::new();
    env.insert(x, px);
    env.insert(y, py);
    if f.evaluate(&env).unwrap_or(false) {
        prop_assert!(
            cs.box_ref().get(0).contains(px) && cs.box_ref().get(1).contains(py),
            "pruning discarded satisfying point ({px}, {py})"
        );
    }
    Ok(())
}

proptest! {
    #[test]
    fn fwdbwd_pruning_is_sound(
        shape in shape_strategy(),
        bounds in (-4.0f64..4.0, -4.0f64..4.0, -4.0f64..4.0, -4.0f64..4.0),
        sample in (0.0f64..=1.0, 0.0f64..=1.0),
    ) {
        prune_with(
            |f, bx| Contractor::fwd_bwd(f, bx, 1),
            shape,
            bounds,
            sample,
        )?;
    }

    #[test]
    fn polytope_pruning_is_sound(
        shape in shape_strategy(),
        bounds in (-4.0f64..4.0, -4.0f64..4.0, -4.0f64..4.0, -4.0f64..4.0),
        sample in (0.0f64..=1.0, 0.0f64..=1.0),
    ) {
        prune_with(
            |f, bx| Contractor::polytope(vec![f], bx, 1),
            shape,
            bounds,
            sample,
        )?;
    }

    #[test]
    fn fixpoint_of_join_is_sound(
        bounds in (-4.0f64..4.0, -4.0f64..4.0, -4.0f64..4.0, -4.0f64..4.0),
        sample in (0.0f64..=1.0, 0.0f64..=1.0),
    ) {
        // Combine two constraints the way the solver does.
        let (xl, xu, yl, yu) = bounds;
        let x = Variable::continuous("x");
        let y = Variable::continuous("y");
        let bx = IntervalBox::new([
            (x.clone(), Interval::new(xl.min(xu), xl.max(xu))),
            (y.clone(), Interval::new(yl.min(yu), yl.max(yu))),
        ]);
        let f1 = formula(Shape::CircleLeq, &x, &y);
        let f2 = formula(Shape::LineLeq, &x, &y);
        let contractor = Contractor::fixpoint(
            Contractor::seq(
                vec![
                    Contractor::fwd_bwd(f1.clone(), &bx, 1),
                    Contractor::fwd_bwd(f2.clone(), &bx, 1),
                    Contractor::polytope(vec![f1.clone(), f2.clone()], &bx, 1),
                ],
                bx.size(),
            ),
            0.01,
        );

        let mut cs = ContractorStatus::new(bx.clone());
        contractor.prune(&mut cs, 0);

        let (s, t) = sample;
        let px = bx.get(0).lb() + bx.get(0).diam() * s;
        let py = bx.get(1).lb() + bx.get(1).diam() * t;
        let mut env = Environment::new();
        env.insert(x, px);
        env.insert(y, py);
        let satisfied = f1.evaluate(&env).unwrap_or(false) && f2.evaluate(&env).unwrap_or(false);
        if satisfied {
            prop_assert!(
                cs.box_ref().get(0).contains(px) && cs.box_ref().get(1).contains(py),
                "composed pruning discarded satisfying point ({px}, {py})"
            );
        }
    }
}
