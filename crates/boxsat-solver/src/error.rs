//! Engine errors.

use boxsat_eval::EvalError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("solve interrupted")]
    Interrupted,

    #[error(transparent)]
    Eval(#[from] EvalError),
}
