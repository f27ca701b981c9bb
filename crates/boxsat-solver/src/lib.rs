//! Branch-and-prune ICP engines over interval boxes.
//!
//! [`Icp`] drives a depth-first sequential search; [`IcpParallel`] shares
//! branching work between a fixed pool of symmetric workers through a
//! lock-free global stack. Both return a δ-box witness through the caller's
//! [`ContractorStatus`](boxsat_contractor::ContractorStatus) on success.

mod branch;
mod config;
mod error;
mod icp;
mod icp_parallel;
pub mod interrupt;
mod stat;

pub use config::{BranchingStrategy, Config};
pub use error::SolverError;
pub use icp::Icp;
pub use icp_parallel::IcpParallel;
pub use stat::IcpStats;
