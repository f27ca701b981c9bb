//! Engine configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BranchingStrategy {
    /// Bisect the widest candidate dimension at its midpoint.
    #[default]
    MaxDiam,
    /// Descend the summed constraint error from the midpoint and bisect the
    /// widest candidate at the descended coordinate.
    GradientDescent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Worker count of the parallel engine (≥ 1).
    pub number_of_jobs: usize,
    /// δ threshold on the width of constraint evaluations.
    pub precision: f64,
    /// Initial stacking polarity; flipped on every max-diameter branch.
    pub stack_left_box_first: bool,
    pub branching_strategy: BranchingStrategy,
    /// Consumer-side switch, carried but not interpreted by the engines.
    pub use_polytope_in_forall: bool,
    /// Relative shrink per sweep below which a fixpoint contractor stops.
    pub fixpoint_ratio: f64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            number_of_jobs: 1,
            precision: 1e-3,
            stack_left_box_first: false,
            branching_strategy: BranchingStrategy::default(),
            use_polytope_in_forall: false,
            fixpoint_ratio: 0.01,
        }
    }
}
