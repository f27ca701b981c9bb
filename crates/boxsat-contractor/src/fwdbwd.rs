//! HC4-revise: forward interval sweep, backward projection, for one atomic
//! constraint `lhs ⋈ rhs`.
//!
//! The residual `lhs − rhs` is compiled once into a post-order tape whose
//! slots mirror the expression DAG (hash-consing dedups shared sub-terms into
//! one slot, so their narrowings intersect). A prune evaluates the tape
//! forward, projects the relation onto the root, then walks the tape backward
//! narrowing children through inverse operations.

use crate::status::ContractorStatus;
use boxsat_eval::{apply_binary, apply_unary};
use boxsat_interval::{DimensionSet, Interval, IntervalBox};
use boxsat_symbolic::{
    BinaryOp, ExprNode, Expression, Formula, FormulaNode, RelationalOp, UnaryOp,
};
use rustc_hash::FxHashMap;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
enum TapeOp {
    Var { dim: usize },
    Const(Interval),
    Unary(UnaryOp, usize),
    Binary(BinaryOp, usize, usize),
}

/// Single-constraint forward-backward contractor.
///
/// A constraint that cannot be compiled (unsupported nodes, or no free
/// variables to narrow) yields a dummy whose prune is a no-op. Quantified
/// formulas are an invariant violation: the caller must filter them.
pub struct FwdBwd {
    formula: Formula,
    op: RelationalOp,
    tape: Vec<TapeOp>,
    /// `(slot, box dimension)` of every variable leaf.
    vars: Vec<(usize, usize)>,
    input: DimensionSet,
    dummy: bool,
    values: Vec<Interval>,
}

fn compile(
    e: &Expression,
    bx: &IntervalBox,
    tape: &mut Vec<TapeOp>,
    memo: &mut FxHashMap<Expression, usize>,
) -> Option<usize> {
    if let Some(&slot) = memo.get(e) {
        return Some(slot);
    }
    let op = match e.node() {
        ExprNode::Variable(v) => TapeOp::Var {
            dim: bx.index_of(v)?,
        },
        ExprNode::Constant(c) => TapeOp::Const(Interval::point(*c)),
        ExprNode::RealConstant { lb, ub, .. } => TapeOp::Const(Interval::new(*lb, *ub)),
        ExprNode::NaN => return None,
        ExprNode::Unary(op, a) => TapeOp::Unary(*op, compile(a, bx, tape, memo)?),
        ExprNode::Binary(op, a, b) => {
            let sa = compile(a, bx, tape, memo)?;
            let sb = compile(b, bx, tape, memo)?;
            TapeOp::Binary(*op, sa, sb)
        }
        ExprNode::IfThenElse(..) | ExprNode::UninterpretedFunction { .. } => return None,
    };
    tape.push(op);
    let slot = tape.len() - 1;
    memo.insert(e.clone(), slot);
    Some(slot)
}

impl FwdBwd {
    pub fn new(formula: Formula, bx: &IntervalBox) -> FwdBwd {
        assert!(
            !formula.is_forall(),
            "forward-backward contractor over a quantified formula"
        );
        let mut input = DimensionSet::new(bx.size());
        let compiled = match formula.node() {
            FormulaNode::Relational { op, lhs, rhs } => {
                let residual = Expression::sub(lhs.clone(), rhs.clone());
                let mut tape = Vec::new();
                let mut memo = FxHashMap::default();
                match compile(&residual, bx, &mut tape, &mut memo) {
                    Some(_) => {
                        let vars: Vec<(usize, usize)> = tape
                            .iter()
                            .enumerate()
                            .filter_map(|(slot, op)| match op {
                                TapeOp::Var { dim } => Some((slot, *dim)),
                                _ => None,
                            })
                            .collect();
                        for &(_, dim) in &vars {
                            input.add(dim);
                        }
                        let dummy = vars.is_empty();
                        Some((*op, tape, vars, dummy))
                    }
                    None => None,
                }
            }
            _ => None,
        };
        let (op, tape, vars, dummy) =
            compiled.unwrap_or((RelationalOp::Eq, Vec::new(), Vec::new(), true));
        let values = vec![Interval::EMPTY; tape.len()];
        FwdBwd {
            formula,
            op,
            tape,
            vars,
            input,
            dummy,
            values,
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
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
        cs.add_used_constraint(self.formula.clone());
    }

    pub fn prune(&mut self, cs: &mut ContractorStatus) {
        if self.dummy || cs.box_ref().is_empty() {
            return;
        }

        // Forward sweep.
        for i in 0..self.tape.len() {
            self.values[i] = match self.tape[i] {
                TapeOp::Var { dim } => cs.box_ref().get(dim),
                TapeOp::Const(c) => c,
                TapeOp::Unary(op, a) => apply_unary(op, self.values[a]),
                TapeOp::Binary(op, a, b) => apply_binary(op, self.values[a], self.values[b]),
            };
        }

        // Project the relation onto the root.
        let root = self.tape.len() - 1;
        let value = self.values[root];
        let constrained = match self.op {
            RelationalOp::Leq | RelationalOp::Lt => {
                value.intersect(Interval::new(f64::NEG_INFINITY, 0.0))
            }
            RelationalOp::Geq | RelationalOp::Gt => {
                value.intersect(Interval::new(0.0, f64::INFINITY))
            }
            RelationalOp::Eq => value.intersect(Interval::point(0.0)),
            RelationalOp::Neq => {
                if value.is_degenerate() && value.lb() == 0.0 {
                    Interval::EMPTY
                } else {
                    value
                }
            }
        };
        if constrained.is_empty() {
            trace!(formula = %self.formula, "fwdbwd: relation infeasible on box");
            self.report_empty(cs);
            return;
        }
        self.values[root] = constrained;

        // Backward sweep.
        for i in (0..self.tape.len()).rev() {
            let parent = self.values[i];
            match self.tape[i] {
                TapeOp::Var { .. } | TapeOp::Const(_) => {}
                TapeOp::Unary(op, a) => {
                    let na = backward_unary(op, parent, self.values[a]);
                    if na.is_empty() {
                        self.report_empty(cs);
                        return;
                    }
                    self.values[a] = self.values[a].intersect(na);
                }
                TapeOp::Binary(op, a, b) => {
                    let (na, nb) = backward_binary(op, parent, self.values[a], self.values[b]);
                    if na.is_empty() || nb.is_empty() {
                        self.report_empty(cs);
                        return;
                    }
                    self.values[a] = self.values[a].intersect(na);
                    self.values[b] = self.values[b].intersect(nb);
                }
            }
        }

        // Write narrowed variable slots back into the box.
        let mut changed = false;
        for &(slot, dim) in &self.vars {
            let new = self.values[slot];
            if new.is_empty() {
                self.report_empty(cs);
                return;
            }
            if new != cs.box_ref().get(dim) {
                cs.box_mut().set(dim, new);
                cs.output_mut().add(dim);
                changed = true;
            }
        }
        if changed {
            cs.add_used_constraint(self.formula.clone());
        }
    }
}

fn backward_unary(op: UnaryOp, p: Interval, a: Interval) -> Interval {
    match op {
        UnaryOp::Exp => a.intersect(p.log()),
        UnaryOp::Log => a.intersect(p.exp()),
        UnaryOp::Sqrt => a.intersect(p.sqr()),
        UnaryOp::Abs => {
            let pp = p.intersect(Interval::new(0.0, f64::INFINITY));
            a.intersect(pp).hull(a.intersect(-pp))
        }
        UnaryOp::Asin => a.intersect(p.sin()),
        UnaryOp::Acos => a.intersect(p.cos()),
        UnaryOp::Atan => a.intersect(p.tan()),
        UnaryOp::Sinh => a.intersect(p.asinh()),
        UnaryOp::Cosh => {
            let r = p.acosh();
            a.intersect(r).hull(a.intersect(-r))
        }
        UnaryOp::Tanh => a.intersect(p.atanh()),
        // Periodic inverses are multi-branch; not narrowing is sound.
        UnaryOp::Sin | UnaryOp::Cos | UnaryOp::Tan => a,
    }
}

fn backward_binary(op: BinaryOp, p: Interval, a: Interval, b: Interval) -> (Interval, Interval) {
    match op {
        BinaryOp::Add => (a.intersect(p - b), b.intersect(p - a)),
        BinaryOp::Mul => {
            let na = a.intersect(backward_factor(p, b, a));
            let nb = b.intersect(backward_factor(p, na, b));
            (na, nb)
        }
        BinaryOp::Div => {
            // p = a / b.
            let na = a.intersect(p * b);
            let nb = if p.is_degenerate() && p.lb() == 0.0 {
                b
            } else {
                b.intersect(na / p)
            };
            (na, nb)
        }
        BinaryOp::Pow => (backward_pow(p, a, b), b),
        BinaryOp::Min => {
            let floor = Interval::new(p.lb(), f64::INFINITY);
            (a.intersect(floor), b.intersect(floor))
        }
        BinaryOp::Max => {
            let ceiling = Interval::new(f64::NEG_INFINITY, p.ub());
            (a.intersect(ceiling), b.intersect(ceiling))
        }
        // atan2 projection crosses the branch cut; not narrowing is sound.
        BinaryOp::Atan2 => (a, b),
    }
}

/// Projection of `p = x · divisor` onto `x`: `p / divisor`, except that a
/// zero divisor carries no information about `x`.
fn backward_factor(p: Interval, divisor: Interval, x: Interval) -> Interval {
    if divisor.is_degenerate() && divisor.lb() == 0.0 {
        x
    } else {
        p / divisor
    }
}

/// Projection of `p = aᵉ` onto the base `a`.
fn backward_pow(p: Interval, a: Interval, e: Interval) -> Interval {
    if !e.is_degenerate() {
        return a;
    }
    let exponent = e.lb();
    if exponent == 0.0 {
        return a;
    }
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        let n = exponent as i32;
        let (target, m) = if n > 0 {
            (p, n)
        } else {
            // aⁿ = p with n < 0 means a⁻ⁿ = 1/p.
            (Interval::point(1.0) / p, -n)
        };
        if target.is_empty() {
            return Interval::EMPTY;
        }
        if m % 2 == 1 {
            return a.intersect(target.root(m));
        }
        let r = target.root(m);
        return a.intersect(r).hull(a.intersect(-r));
    }
    // Real exponent: the base is confined to [0, ∞).
    a.intersect(p.pow_point(1.0 / exponent))
}
