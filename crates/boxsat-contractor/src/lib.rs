//! Pruning contractors for the boxsat search loop.
//!
//! A contractor maps a box to a sub-box that preserves every solution of its
//! associated constraints. Contractors are shared read-only between workers;
//! the per-search-path mutable state travels in [`ContractorStatus`], and
//! contractors with per-instance scratch state are fronted by per-worker slot
//! wrappers (see [`mt`]).

mod contractor;
mod fwdbwd;
mod mt;
mod polytope;
mod status;

pub use contractor::{Contractor, ContractorCell, ContractorKind};
pub use fwdbwd::FwdBwd;
pub use polytope::Polytope;
pub use status::ContractorStatus;
