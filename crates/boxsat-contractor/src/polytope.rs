//! Linear-relaxation hull pruning over a conjunction of constraints.
//!
//! Each usable constraint `f ⋈ 0` is enclosed by its first-order mean-value
//! form `f(x) ∈ F⁰ + Σᵢ Gᵢ·(xᵢ − x⁰ᵢ)` with interval gradients over the box.
//! A Gauss-Seidel sweep solves each enclosure for each participating variable
//! in turn, tightening the box against the relaxation of the whole system.

use crate::status::ContractorStatus;
use boxsat_eval::{ExpressionEvaluator, FormulaEvaluator};
use boxsat_interval::{DimensionSet, Interval, IntervalBox};
use boxsat_symbolic::{Expression, Formula, FormulaNode, RelationalOp};
use tracing::trace;

struct LinearizedConstraint {
    op: RelationalOp,
    residual: ExpressionEvaluator,
    /// `(box dimension, ∂residual/∂x)` for every participating variable.
    gradients: Vec<(usize, ExpressionEvaluator)>,
}

/// Polytope-hull contractor for a constraint system.
///
/// Constraints that are quantified, non-relational, disequalities, or not
/// differentiable are left to other pruners. A system with no usable
/// constraint is a dummy whose prune is a no-op.
pub struct Polytope {
    formulas: Vec<Formula>,
    constraints: Vec<LinearizedConstraint>,
    input: DimensionSet,
    dummy: bool,
}

fn linearize(f: &Formula, bx: &IntervalBox) -> Option<LinearizedConstraint> {
    if f.is_forall() {
        return None;
    }
    let FormulaNode::Relational { op, lhs, rhs } = f.node() else {
        return None;
    };
    if *op == RelationalOp::Neq {
        return None;
    }
    // Reject nodes the interval evaluator cannot handle.
    FormulaEvaluator::new(f.clone()).ok()?;
    let residual = Expression::sub(lhs.clone(), rhs.clone());
    let mut gradients = Vec::new();
    for v in residual.variables() {
        let dim = bx.index_of(&v)?;
        let g = residual.differentiate(&v).ok()?;
        gradients.push((dim, ExpressionEvaluator::new(g)));
    }
    if gradients.is_empty() {
        return None;
    }
    gradients.sort_by_key(|(dim, _)| *dim);
    Some(LinearizedConstraint {
        op: *op,
        residual: ExpressionEvaluator::new(residual),
        gradients,
    })
}

impl Polytope {
    pub fn new(formulas: Vec<Formula>, bx: &IntervalBox) -> Polytope {
        let constraints: Vec<LinearizedConstraint> =
            formulas.iter().filter_map(|f| linearize(f, bx)).collect();
        let mut input = DimensionSet::new(bx.size());
        for c in &constraints {
            for &(dim, _) in &c.gradients {
                input.add(dim);
            }
        }
        let dummy = constraints.is_empty();
        Polytope {
            formulas,
            constraints,
            input,
            dummy,
        }
    }

    pub fn input(&self) -> &DimensionSet {
        &self.input
    }

    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    fn report_empty(&self, cs: &mut ContractorStatus) {
        cs.box_mut().set_empty();
        cs.output_mut().fill();
        cs.add_used_constraints(self.formulas.iter().cloned());
    }

    pub fn prune(&mut self, cs: &mut ContractorStatus) {
        if self.dummy || cs.box_ref().is_empty() {
            return;
        }
        let mut changed = false;
        for c in &self.constraints {
            // Midpoint expansion against the current (already tightened) box.
            let mut mid = cs.box_ref().clone();
            for i in 0..mid.size() {
                mid.set(i, Interval::point(cs.box_ref().get(i).mid()));
            }
            let Ok(f0) = c.residual.eval(&mid) else {
                continue;
            };
            if f0.is_empty() {
                continue;
            }

            // Interval gradients and centred offsets.
            let mut terms: Vec<(usize, Interval, Interval, f64)> =
                Vec::with_capacity(c.gradients.len());
            let mut usable = true;
            for (dim, gev) in &c.gradients {
                let Ok(g) = gev.eval(cs.box_ref()) else {
                    usable = false;
                    break;
                };
                if g.is_empty() {
                    usable = false;
                    break;
                }
                let x0 = mid.get(*dim).lb();
                let d = cs.box_ref().get(*dim) - Interval::point(x0);
                terms.push((*dim, g, d, x0));
            }
            if !usable {
                continue;
            }

            let target = match c.op {
                RelationalOp::Leq | RelationalOp::Lt => {
                    Interval::new(f64::NEG_INFINITY, 0.0)
                }
                RelationalOp::Geq | RelationalOp::Gt => Interval::new(0.0, f64::INFINITY),
                RelationalOp::Eq => Interval::point(0.0),
                RelationalOp::Neq => unreachable!("disequalities are not linearized"),
            };

            // Solve the enclosure for each variable in turn.
            for j in 0..terms.len() {
                let (dim, g, _, x0) = terms[j];
                let mut rest = Interval::point(0.0);
                for (i, &(_, gi, di, _)) in terms.iter().enumerate() {
                    if i != j {
                        rest = rest + gi * di;
                    }
                }
                let t = target - f0 - rest;
                let projected = Interval::point(x0) + t / g;
                let old = cs.box_ref().get(dim);
                let new = old.intersect(projected);
                if new.is_empty() {
                    trace!("polytope: relaxation infeasible on dimension {dim}");
                    self.report_empty(cs);
                    return;
                }
                if new != old {
                    cs.box_mut().set(dim, new);
                    cs.output_mut().add(dim);
                    changed = true;
                }
            }
        }
        if changed {
            cs.add_used_constraints(self.formulas.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxsat_symbolic::Variable;

    #[test]
    fn zero_constraints_make_a_dummy() {
        let x = Variable::continuous("x");
        let bx = IntervalBox::new([(x, Interval::new(0.0, 1.0))]);
        let p = Polytope::new(vec![], &bx);
        assert!(p.is_dummy());
        // Dummy pruning is a no-op, not an abort.
        let mut cs = ContractorStatus::new(bx);
        let mut p = p;
        p.prune(&mut cs);
        assert!(!cs.box_ref().is_empty());
    }

    #[test]
    fn tightens_linear_system() {
        // x + y <= 1 over [0, 10]² shrinks both dimensions to [0, 1].
        let x = Variable::continuous("x");
        let y = Variable::continuous("y");
        let sum = Expression::add(Expression::variable(&x), Expression::variable(&y));
        let diff = Expression::sub(Expression::variable(&y), Expression::variable(&x));
        let formulas = vec![
            Formula::leq(sum, Expression::one()),
            Formula::leq(diff, Expression::one()),
        ];
        let bx = IntervalBox::new([
            (x, Interval::new(0.0, 10.0)),
            (y, Interval::new(0.0, 10.0)),
        ]);
        let mut p = Polytope::new(formulas, &bx);
        assert!(!p.is_dummy());
        let mut cs = ContractorStatus::new(bx);
        p.prune(&mut cs);
        assert!(cs.box_ref().get(0).ub() <= 1.0 + 1e-6);
        assert!(cs.box_ref().get(1).ub() <= 1.0 + 1e-6);
        assert!(cs.output().contains(0) && cs.output().contains(1));
    }

    #[test]
    fn pruning_preserves_solutions() {
        // x² + y = 0 keeps the solution (0.5, -0.25).
        let x = Variable::continuous("x");
        let y = Variable::continuous("y");
        let f = Formula::eq(
            Expression::add(
                Expression::pow(Expression::variable(&x), Expression::constant(2.0)),
                Expression::variable(&y),
            ),
            Expression::zero(),
        );
        let bx = IntervalBox::new([
            (x, Interval::new(-1.0, 1.0)),
            (y, Interval::new(-1.0, 1.0)),
        ]);
        let mut p = Polytope::new(vec![f], &bx);
        let mut cs = ContractorStatus::new(bx);
        p.prune(&mut cs);
        assert!(cs.box_ref().get(0).contains(0.5));
        assert!(cs.box_ref().get(1).contains(-0.25));
    }

    #[test]
    fn forall_constraints_are_skipped() {
        let x = Variable::continuous("x");
        let body = Formula::leq(Expression::variable(&x), Expression::zero());
        let bx = IntervalBox::new([(x.clone(), Interval::new(0.0, 1.0))]);
        let p = Polytope::new(vec![Formula::forall(vec![x], body)], &bx);
        assert!(p.is_dummy());
    }
}
