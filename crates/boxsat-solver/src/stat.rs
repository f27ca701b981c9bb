//! Search statistics, merged across workers after a parallel solve.

/// Counts and nanosecond timings for the three phases of the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IcpStats {
    pub branches: u64,
    pub prunes: u64,
    pub prune_ns: u64,
    pub eval_ns: u64,
    pub branch_ns: u64,
}

impl IcpStats {
    pub fn merge(&mut self, other: &IcpStats) {
        self.branches += other.branches;
        self.prunes += other.prunes;
        self.prune_ns += other.prune_ns;
        self.eval_ns += other.eval_ns;
        self.branch_ns += other.branch_ns;
    }
}
