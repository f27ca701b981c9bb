//! Evaluation errors.

use boxsat_symbolic::SymbolicError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("{0} is not supported by interval evaluation")]
    Unsupported(&'static str),

    #[error(transparent)]
    Symbolic(#[from] SymbolicError),
}
