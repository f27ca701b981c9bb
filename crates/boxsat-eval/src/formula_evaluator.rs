//! Decision of atomic relational constraints over a box.

use crate::error::EvalError;
use crate::expression_evaluator::ExpressionEvaluator;
use boxsat_interval::{Interval, IntervalBox};
use boxsat_symbolic::{ExprNode, Expression, Formula, FormulaNode, RelationalOp, Variable};
use std::fmt;

/// Outcome of evaluating one constraint on one box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationKind {
    /// No point of the box satisfies the constraint.
    Unsat,
    /// Every point of the box satisfies the constraint.
    Valid,
    /// Neither could be concluded.
    Unknown,
}

#[derive(Debug, Clone)]
pub struct FormulaEvaluationResult {
    pub kind: EvaluationKind,
    /// The residual enclosure of `lhs − rhs` over the box.
    pub evaluation: Interval,
}

/// Compiled evaluator for one atomic constraint `lhs ⋈ rhs`.
///
/// Construction validates the formula: it must be relational (in particular
/// not `forall`) and its residual must be free of nodes the interval
/// evaluator rejects.
#[derive(Clone)]
pub struct FormulaEvaluator {
    formula: Formula,
    op: RelationalOp,
    residual: ExpressionEvaluator,
    variables: Vec<Variable>,
}

fn find_unsupported(e: &Expression) -> Option<&'static str> {
    match e.node() {
        ExprNode::Variable(_)
        | ExprNode::Constant(_)
        | ExprNode::RealConstant { .. }
        | ExprNode::NaN => None,
        ExprNode::Unary(_, a) => find_unsupported(a),
        ExprNode::Binary(_, a, b) => find_unsupported(a).or_else(|| find_unsupported(b)),
        ExprNode::IfThenElse(..) => Some("if-then-else"),
        ExprNode::UninterpretedFunction { .. } => Some("uninterpreted function"),
    }
}

impl FormulaEvaluator {
    pub fn new(formula: Formula) -> Result<FormulaEvaluator, EvalError> {
        let (op, lhs, rhs) = match formula.node() {
            FormulaNode::Relational { op, lhs, rhs } => (*op, lhs.clone(), rhs.clone()),
            _ => {
                return Err(EvalError::Unsupported(if formula.is_forall() {
                    "quantified constraint"
                } else {
                    "non-relational formula"
                }))
            }
        };
        let residual = Expression::sub(lhs, rhs);
        if let Some(what) = find_unsupported(&residual) {
            return Err(EvalError::Unsupported(what));
        }
        let mut variables: Vec<Variable> = formula.free_variables().into_iter().collect();
        variables.sort();
        Ok(FormulaEvaluator {
            op,
            residual: ExpressionEvaluator::new(residual),
            variables,
            formula,
        })
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Free variables of the constraint, in a deterministic order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Decide the constraint over `b`.
    ///
    /// Strict inequalities decide like their weak forms (δ-weakening); an
    /// empty residual means no point of the box is in the constraint's
    /// domain, which refutes it.
    pub fn evaluate(&self, b: &IntervalBox) -> Result<FormulaEvaluationResult, EvalError> {
        let evaluation = self.residual.eval(b)?;
        let kind = if evaluation.is_empty() {
            EvaluationKind::Unsat
        } else {
            let (lo, hi) = (evaluation.lb(), evaluation.ub());
            match self.op {
                RelationalOp::Leq | RelationalOp::Lt => {
                    if lo > 0.0 {
                        EvaluationKind::Unsat
                    } else if hi <= 0.0 {
                        EvaluationKind::Valid
                    } else {
                        EvaluationKind::Unknown
                    }
                }
                RelationalOp::Geq | RelationalOp::Gt => {
                    if hi < 0.0 {
                        EvaluationKind::Unsat
                    } else if lo >= 0.0 {
                        EvaluationKind::Valid
                    } else {
                        EvaluationKind::Unknown
                    }
                }
                RelationalOp::Eq => {
                    if !evaluation.contains(0.0) {
                        EvaluationKind::Unsat
                    } else if lo == 0.0 && hi == 0.0 {
                        EvaluationKind::Valid
                    } else {
                        EvaluationKind::Unknown
                    }
                }
                RelationalOp::Neq => {
                    if !evaluation.contains(0.0) {
                        EvaluationKind::Valid
                    } else if lo == 0.0 && hi == 0.0 {
                        EvaluationKind::Unsat
                    } else {
                        EvaluationKind::Unknown
                    }
                }
            }
        };
        Ok(FormulaEvaluationResult { kind, evaluation })
    }
}

impl fmt::Display for FormulaEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormulaEvaluator({})", self.formula)
    }
}
