//! Interval evaluation of symbolic expressions and relational constraints.
//!
//! [`ExpressionEvaluator`] certifies enclosures of an expression over a box;
//! [`taylor1_eval`] and [`taylor2_eval`] give tighter mean-value enclosures
//! near the interior of wide boxes. [`FormulaEvaluator`] decides an atomic
//! constraint over a box as UNSAT, VALID or UNKNOWN with a residual interval.

mod error;
mod expression_evaluator;
mod formula_evaluator;

pub use error::EvalError;
pub use expression_evaluator::{
    apply_binary, apply_unary, taylor1_eval, taylor2_eval, ExpressionEvaluator,
};
pub use formula_evaluator::{EvaluationKind, FormulaEvaluationResult, FormulaEvaluator};
