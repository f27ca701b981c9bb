//! End-to-end branch-and-prune scenarios, sequential and parallel.

use boxsat_contractor::{Contractor, ContractorStatus};
use boxsat_eval::FormulaEvaluator;
use boxsat_interval::{Interval, IntervalBox};
use boxsat_solver::{BranchingStrategy, Config, Icp, IcpParallel};
use boxsat_symbolic::{Expression, Formula, Variable};
use std::f64::consts::PI;

fn var(v: &Variable) -> Expression {
    Expression::variable(v)
}

fn sq(e: Expression) -> Expression {
    Expression::pow(e, Expression::constant(2.0))
}

/// The composed contractor used by all scenarios: per-constraint HC4 plus the
/// polytope hull, iterated to a fixpoint.
fn build(
    formulas: &[Formula],
    bx: &IntervalBox,
    config: &Config,
) -> (Contractor, Vec<FormulaEvaluator>) {
    let jobs = config.number_of_jobs;
    let mut children: Vec<Contractor> = formulas
        .iter()
        .map(|f| Contractor::fwd_bwd(f.clone(), bx, jobs))
        .collect();
    children.push(Contractor::polytope(formulas.to_vec(), bx, jobs));
    let contractor = Contractor::fixpoint(
        Contractor::seq(children, bx.size()),
        config.fixpoint_ratio,
    );
    let evaluators = formulas
        .iter()
        .map(|f| FormulaEvaluator::new(f.clone()).expect("constraint must be evaluable"))
        .collect();
    (contractor, evaluators)
}

fn circle_cap() -> (Vec<Formula>, IntervalBox) {
    let x = Variable::continuous("x");
    let y = Variable::continuous("y");
    let formulas = vec![
        Formula::eq(
            Expression::add(sq(var(&x)), sq(var(&y))),
            Expression::one(),
        ),
        Formula::geq(var(&x), Expression::constant(0.9)),
    ];
    let bx = IntervalBox::new([
        (x, Interval::new(-1.0, 1.0)),
        (y, Interval::new(-1.0, 1.0)),
    ]);
    (formulas, bx)
}

#[test]
fn circle_cap_is_delta_sat() {
    let config = Config {
        precision: 1e-3,
        ..Config::default()
    };
    let (formulas, bx) = circle_cap();
    let (contractor, evaluators) = build(&formulas, &bx, &config);
    let mut icp = Icp::new(config);
    let mut cs = ContractorStatus::new(bx);
    assert!(icp.check_sat(&contractor, &evaluators, &mut cs).unwrap());

    let witness = cs.box_ref();
    assert!(witness.get(0).lb() >= 0.9 - 1e-3);
    assert!(witness.get(0).ub() <= 1.0 + 1e-9);
    // |y| <= sqrt(1 - 0.9²) plus slack for delta and x dipping to 0.899.
    assert!(witness.get(1).ub() <= 0.44);
    assert!(witness.get(1).lb() >= -0.44);
    assert!(icp.stats().prunes > 0);
}

#[test]
fn negative_square_is_unsat() {
    let x = Variable::continuous("x");
    let formulas = vec![Formula::eq(sq(var(&x)), Expression::constant(-1.0))];
    let bx = IntervalBox::new([(x, Interval::new(-10.0, 10.0))]);

    let config = Config::default();
    let (contractor, evaluators) = build(&formulas, &bx, &config);
    let mut icp = Icp::new(config);
    let mut cs = ContractorStatus::new(bx.clone());
    assert!(!icp.check_sat(&contractor, &evaluators, &mut cs).unwrap());

    let config = Config {
        number_of_jobs: 4,
        ..Config::default()
    };
    let (contractor, evaluators) = build(&formulas, &bx, &config);
    let mut parallel = IcpParallel::new(config);
    let mut cs = ContractorStatus::new(bx);
    assert!(!parallel.check_sat(&contractor, &evaluators, &mut cs).unwrap());
    assert!(cs.box_ref().is_empty());
}

#[test]
fn sine_root_near_pi() {
    let x = Variable::continuous("x");
    let formulas = vec![Formula::eq(Expression::sin(var(&x)), Expression::zero())];
    let bx = IntervalBox::new([(x, Interval::new(3.0, 3.2))]);

    let config = Config {
        precision: 1e-3,
        ..Config::default()
    };
    let (contractor, evaluators) = build(&formulas, &bx, &config);
    let mut icp = Icp::new(config);
    let mut cs = ContractorStatus::new(bx);
    assert!(icp.check_sat(&contractor, &evaluators, &mut cs).unwrap());
    assert!(cs.box_ref().get(0).contains(PI));
}

/// Rosenbrock-style chain over eight variables with its root at (1, …, 1).
fn rosenbrock() -> (Vec<Formula>, IntervalBox) {
    let vars: Vec<Variable> = (0..8)
        .map(|i| Variable::continuous(format!("x{i}")))
        .collect();
    let formulas: Vec<Formula> = (0..7)
        .map(|i| {
            let head = sq(Expression::sub(Expression::one(), var(&vars[i])));
            let tail = Expression::mul(
                Expression::constant(100.0),
                sq(Expression::sub(var(&vars[i + 1]), sq(var(&vars[i])))),
            );
            Formula::eq(Expression::add(head, tail), Expression::zero())
        })
        .collect();
    let bx = IntervalBox::new(
        vars.into_iter()
            .map(|v| (v, Interval::new(-2.0, 2.0))),
    );
    (formulas, bx)
}

#[test]
fn rosenbrock_chain_parallel() {
    let config = Config {
        number_of_jobs: 4,
        precision: 1e-2,
        ..Config::default()
    };
    let (formulas, bx) = rosenbrock();
    let (contractor, evaluators) = build(&formulas, &bx, &config);
    let mut parallel = IcpParallel::new(config);
    let mut cs = ContractorStatus::new(bx);
    assert!(parallel.check_sat(&contractor, &evaluators, &mut cs).unwrap());
    for i in 0..8 {
        let iv = cs.box_ref().get(i);
        assert!(
            (iv.mid() - 1.0).abs() < 0.1,
            "dimension {i} far from the root: {iv}"
        );
    }
    assert!(parallel.stats().prunes >= 1);
}

#[test]
fn parallel_and_sequential_agree() {
    for jobs in [1, 2, 4] {
        let config = Config {
            number_of_jobs: jobs,
            precision: 1e-3,
            ..Config::default()
        };
        let (formulas, bx) = circle_cap();
        let (contractor, evaluators) = build(&formulas, &bx, &config);
        let mut parallel = IcpParallel::new(config);
        let mut cs = ContractorStatus::new(bx);
        assert!(parallel.check_sat(&contractor, &evaluators, &mut cs).unwrap());
        assert!(!cs.box_ref().is_empty());
        assert!(cs.box_ref().get(0).lb() >= 0.9 - 1e-3);
    }
}

#[test]
fn sequential_search_is_deterministic() {
    let run = || {
        let config = Config {
            precision: 1e-3,
            stack_left_box_first: true,
            ..Config::default()
        };
        let (formulas, bx) = circle_cap();
        let (contractor, evaluators) = build(&formulas, &bx, &config);
        let mut icp = Icp::new(config);
        let mut cs = ContractorStatus::new(bx);
        let sat = icp.check_sat(&contractor, &evaluators, &mut cs).unwrap();
        (sat, icp.stats().branches, icp.stats().prunes)
    };
    let (sat1, branches1, prunes1) = run();
    let (sat2, branches2, prunes2) = run();
    assert!(sat1 && sat2);
    assert_eq!(branches1, branches2);
    assert_eq!(prunes1, prunes2);
}

#[test]
fn gradient_descent_branching_also_solves() {
    let config = Config {
        precision: 1e-3,
        branching_strategy: BranchingStrategy::GradientDescent,
        ..Config::default()
    };
    let (formulas, bx) = circle_cap();
    let (contractor, evaluators) = build(&formulas, &bx, &config);
    let mut icp = Icp::new(config);
    let mut cs = ContractorStatus::new(bx);
    assert!(icp.check_sat(&contractor, &evaluators, &mut cs).unwrap());
    assert!(cs.box_ref().get(0).lb() >= 0.9 - 1e-3);
}

#[test]
fn used_constraints_are_reported() {
    let (formulas, bx) = circle_cap();
    let config = Config::default();
    let (contractor, evaluators) = build(&formulas, &bx, &config);
    let mut icp = Icp::new(config);
    let mut cs = ContractorStatus::new(bx);
    icp.check_sat(&contractor, &evaluators, &mut cs).unwrap();
    // The circle equation must have justified some narrowing.
    assert!(cs.used_constraints().contains(&formulas[0]));
}
