//! Recursive interval evaluation and Taylor mean-value forms.

use crate::error::EvalError;
use boxsat_interval::{Interval, IntervalBox};
use boxsat_symbolic::{BinaryOp, ExprNode, Expression, SymbolicError, UnaryOp};
use std::fmt;

/// Interval evaluator over a fixed expression.
#[derive(Clone)]
pub struct ExpressionEvaluator {
    expression: Expression,
}

impl ExpressionEvaluator {
    pub fn new(expression: Expression) -> ExpressionEvaluator {
        ExpressionEvaluator { expression }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// An enclosure of the expression over `b`.
    pub fn eval(&self, b: &IntervalBox) -> Result<Interval, EvalError> {
        visit(&self.expression, b)
    }
}

impl fmt::Display for ExpressionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpressionEvaluator({})", self.expression)
    }
}

fn visit(e: &Expression, b: &IntervalBox) -> Result<Interval, EvalError> {
    match e.node() {
        ExprNode::Variable(v) => match b.index_of(v) {
            Some(i) => Ok(b.get(i)),
            None => Err(SymbolicError::MissingBinding(v.clone()).into()),
        },
        ExprNode::Constant(c) => Ok(Interval::point(*c)),
        ExprNode::RealConstant { lb, ub, .. } => Ok(Interval::new(*lb, *ub)),
        ExprNode::NaN => Err(SymbolicError::NumericNan.into()),
        ExprNode::Unary(op, arg) => Ok(apply_unary(*op, visit(arg, b)?)),
        ExprNode::Binary(op, lhs, rhs) => {
            Ok(apply_binary(*op, visit(lhs, b)?, visit(rhs, b)?))
        }
        ExprNode::IfThenElse(..) => Err(EvalError::Unsupported("if-then-else")),
        ExprNode::UninterpretedFunction { .. } => {
            Err(EvalError::Unsupported("uninterpreted function"))
        }
    }
}

/// The interval image of one unary primitive.
pub fn apply_unary(op: UnaryOp, x: Interval) -> Interval {
    match op {
        UnaryOp::Log => x.log(),
        UnaryOp::Abs => x.abs(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Sqrt => x.sqrt(),
        UnaryOp::Sin => x.sin(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Tan => x.tan(),
        UnaryOp::Asin => x.asin(),
        UnaryOp::Acos => x.acos(),
        UnaryOp::Atan => x.atan(),
        UnaryOp::Sinh => x.sinh(),
        UnaryOp::Cosh => x.cosh(),
        UnaryOp::Tanh => x.tanh(),
    }
}

/// The interval image of one binary primitive.
pub fn apply_binary(op: BinaryOp, x: Interval, y: Interval) -> Interval {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Pow => visit_pow(x, y),
        BinaryOp::Atan2 => x.atan2(y),
        BinaryOp::Min => x.min(y),
        BinaryOp::Max => x.max(y),
    }
}

/// Degenerate integer exponents take the `sqr`/`powi` route, which is both
/// tighter and defined on negative bases.
fn visit_pow(base: Interval, exponent: Interval) -> Interval {
    if exponent.is_degenerate() {
        let p = exponent.lb();
        if p.fract() == 0.0 && p.abs() <= i32::MAX as f64 {
            return if p == 2.0 {
                base.sqr()
            } else {
                base.powi(p as i32)
            };
        }
        return base.pow_point(p);
    }
    base.pow(exponent)
}

/// The degenerate box of midpoints of `b`.
fn mid_box(b: &IntervalBox) -> IntervalBox {
    let mut m = b.clone();
    for i in 0..b.size() {
        m.set(i, Interval::point(b.get(i).mid()));
    }
    m
}

/// First-order Taylor enclosure:
/// `f(x⁰) + Σᵢ [∂f/∂xᵢ]([x]) · ([xᵢ] − x⁰ᵢ)` with `x⁰ = mid [x]`.
pub fn taylor1_eval(f: &Expression, x: &IntervalBox) -> Result<Interval, EvalError> {
    let x0 = mid_box(x);
    let mut ret = visit(f, &x0)?;
    for i in 0..x.size() {
        let df = f.differentiate(x.variable(i))?;
        ret = ret + visit(&df, x)? * (x.get(i) - x0.get(i));
    }
    Ok(ret)
}

/// Second-order Taylor enclosure. First-order terms are evaluated at the
/// midpoint; second-order terms on the full box, weighted ½ on the diagonal
/// and 1 off-diagonal (each unordered pair is visited once).
pub fn taylor2_eval(f: &Expression, x: &IntervalBox) -> Result<Interval, EvalError> {
    let x0 = mid_box(x);
    let mut ret = visit(f, &x0)?;
    for i in 0..x.size() {
        let df = f.differentiate(x.variable(i))?;
        ret = ret + visit(&df, &x0)? * (x.get(i) - x0.get(i));
    }
    for i in 0..x.size() {
        let dfi = f.differentiate(x.variable(i))?;
        for j in i..x.size() {
            let dfij = dfi.differentiate(x.variable(j))?;
            let weight = if i == j {
                Interval::point(0.5)
            } else {
                Interval::point(1.0)
            };
            ret = ret
                + weight
                    * visit(&dfij, x)?
                    * (x.get(i) - x0.get(i))
                    * (x.get(j) - x0.get(j));
        }
    }
    Ok(ret)
}
