//! Cooperative cancellation.
//!
//! Workers poll the process-global flag at the top of each iteration; there
//! is no forced termination.

use crate::error::SolverError;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Ask running solves to stop at their next iteration.
pub fn request_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Reset the flag, typically before starting a new solve.
pub fn clear_interrupt() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

pub fn check_interrupt() -> Result<(), SolverError> {
    if is_interrupted() {
        Err(SolverError::Interrupted)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_and_clear() {
        clear_interrupt();
        assert!(check_interrupt().is_ok());
        request_interrupt();
        assert_eq!(check_interrupt(), Err(SolverError::Interrupted));
        clear_interrupt();
        assert!(!is_interrupted());
    }
}
