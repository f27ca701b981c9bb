//! Branching point selection and bisection.

use boxsat_interval::{DimensionSet, IntervalBox};
use boxsat_symbolic::{
    Environment, Expression, Formula, FormulaNode, RelationalOp, Variable,
};
use tracing::trace;

/// The widest still-bisectable dimension among the candidates.
pub(crate) fn find_max_diam(
    bx: &IntervalBox,
    candidates: &DimensionSet,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for dim in candidates.iter() {
        let iv = bx.get(dim);
        if !iv.is_bisectable() {
            continue;
        }
        let d = iv.diam();
        if best.map_or(true, |(_, bd)| d > bd) {
            best = Some((dim, d));
        }
    }
    best
}

/// Bisect the widest candidate at its midpoint and push both halves, the
/// side selected by the polarity on top. Returns `true` when no candidate is
/// bisectable, which the caller treats as a δ-SAT leaf.
pub(crate) fn branch_max_diam(
    bx: &IntervalBox,
    candidates: &DimensionSet,
    stack_left_box_first: bool,
    stack: &mut Vec<(IntervalBox, i64)>,
) -> bool {
    let Some((dim, diam)) = find_max_diam(bx, candidates) else {
        return true;
    };
    trace!(dim, diam, "branching at midpoint");
    let (left, right) = bx.bisect(dim);
    let bp = dim as i64;
    if stack_left_box_first {
        stack.push((right, bp));
        stack.push((left, bp));
    } else {
        stack.push((left, bp));
        stack.push((right, bp));
    }
    false
}

/// Squared-violation error term of one constraint, evaluated at a point.
pub(crate) struct ErrorTerm {
    op: RelationalOp,
    residual: Expression,
}

impl ErrorTerm {
    pub(crate) fn from_formula(f: &Formula) -> Option<ErrorTerm> {
        let FormulaNode::Relational { op, lhs, rhs } = f.node() else {
            return None;
        };
        Some(ErrorTerm {
            op: *op,
            residual: Expression::sub(lhs.clone(), rhs.clone()),
        })
    }

    fn value(&self, env: &Environment) -> f64 {
        let Ok(r) = self.residual.evaluate(env) else {
            // Outside some primitive's domain: strongly repel the descent.
            return f64::MAX / 4.0;
        };
        let violation = match self.op {
            RelationalOp::Eq => r.abs(),
            RelationalOp::Leq | RelationalOp::Lt => r.max(0.0),
            RelationalOp::Geq | RelationalOp::Gt => (-r).max(0.0),
            RelationalOp::Neq => 0.0,
        };
        violation * violation
    }
}

fn total_error(terms: &[ErrorTerm], env: &Environment) -> f64 {
    terms.iter().map(|t| t.value(env)).sum()
}

const DESCENT_STEPS: usize = 20;

/// Run a bounded descent on the summed squared violations from the box
/// midpoint, then bisect the widest candidate dimension at the descended
/// coordinate. Returns `true` when no candidate is bisectable (δ-SAT leaf).
pub(crate) fn branch_gradient_descent(
    terms: &[ErrorTerm],
    candidates: &DimensionSet,
    bx: &IntervalBox,
    stack: &mut Vec<(IntervalBox, i64)>,
) -> bool {
    let Some((dim, _)) = find_max_diam(bx, candidates) else {
        return true;
    };

    let vars: Vec<Variable> = bx.registry().variables().to_vec();
    let mut point: Vec<f64> = (0..bx.size()).map(|i| bx.get(i).mid()).collect();
    let env_of = |p: &[f64]| -> Environment {
        vars.iter()
            .cloned()
            .zip(p.iter().copied())
            .collect()
    };

    let mut current = total_error(terms, &env_of(&point));
    for step in 0..DESCENT_STEPS {
        if current == 0.0 {
            break;
        }
        // Central-difference gradient, scaled per dimension.
        let mut grad = vec![0.0; point.len()];
        let mut norm = 0.0f64;
        for i in 0..point.len() {
            let iv = bx.get(i);
            let h = (iv.diam() * 1e-6).max(1e-9);
            let mut fwd = point.clone();
            fwd[i] = (point[i] + h).min(iv.ub());
            let mut bwd = point.clone();
            bwd[i] = (point[i] - h).max(iv.lb());
            let denom = fwd[i] - bwd[i];
            if denom <= 0.0 {
                continue;
            }
            let g = (total_error(terms, &env_of(&fwd)) - total_error(terms, &env_of(&bwd)))
                / denom;
            grad[i] = g;
            norm = norm.max(g.abs());
        }
        if norm == 0.0 || !norm.is_finite() {
            break;
        }
        // Shrinking step length, clamped into the box.
        let scale = 0.25 / (1.0 + step as f64);
        let next: Vec<f64> = (0..point.len())
            .map(|i| {
                let iv = bx.get(i);
                (point[i] - grad[i] / norm * iv.diam() * scale).clamp(iv.lb(), iv.ub())
            })
            .collect();
        let next_error = total_error(terms, &env_of(&next));
        if next_error < current {
            point = next;
            current = next_error;
        }
    }

    // Split the widest candidate at the descended coordinate, kept away from
    // the endpoints so both halves stay bisectable.
    let iv = bx.get(dim);
    let margin = iv.diam() * 0.01;
    let mut split = point[dim].clamp(iv.lb() + margin, iv.ub() - margin);
    if !(iv.lb() < split && split < iv.ub()) {
        split = iv.mid();
    }
    trace!(dim, split, "branching at descended point");
    let (left, right) = bx.bisect_at(dim, split);
    let bp = dim as i64;
    stack.push((left, bp));
    stack.push((right, bp));
    false
}
