//! Error types for symbolic computation.

use crate::variable::Variable;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by scalar evaluation, differentiation and expansion.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SymbolicError {
    #[error("{op} applied outside its real domain (argument {value})")]
    NumericDomain { op: &'static str, value: f64 },

    #[error("NaN cannot be used in numeric computation")]
    NumericNan,

    #[error("variable {0} has no binding in the environment")]
    MissingBinding(Variable),

    #[error("{op} is not differentiable with respect to {var}")]
    NonDifferentiable { op: &'static str, var: Variable },

    #[error("uninterpreted function {0} cannot be evaluated")]
    UninterpretedFunction(Arc<str>),

    #[error("quantified formula cannot be evaluated on a point")]
    QuantifiedEvaluation,
}
