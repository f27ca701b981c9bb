//! Per-search-path mutable state threaded through contractors.

use boxsat_interval::{DimensionSet, IntervalBox};
use boxsat_symbolic::Formula;
use rustc_hash::FxHashSet;

/// The box being pruned, which dimensions the last pruning narrowed, the
/// dimension the box was last branched on (−1 for a root box), and the set of
/// constraints that justified any narrowing on this path.
#[derive(Clone)]
pub struct ContractorStatus {
    bx: IntervalBox,
    output: DimensionSet,
    branching_point: i64,
    used_constraints: FxHashSet<Formula>,
}

impl ContractorStatus {
    pub fn new(bx: IntervalBox) -> ContractorStatus {
        let output = DimensionSet::new(bx.size());
        ContractorStatus {
            bx,
            output,
            branching_point: -1,
            used_constraints: FxHashSet::default(),
        }
    }

    #[inline]
    pub fn box_ref(&self) -> &IntervalBox {
        &self.bx
    }

    #[inline]
    pub fn box_mut(&mut self) -> &mut IntervalBox {
        &mut self.bx
    }

    #[inline]
    pub fn output(&self) -> &DimensionSet {
        &self.output
    }

    #[inline]
    pub fn output_mut(&mut self) -> &mut DimensionSet {
        &mut self.output
    }

    #[inline]
    pub fn branching_point(&self) -> i64 {
        self.branching_point
    }

    pub fn set_branching_point(&mut self, dim: i64) {
        self.branching_point = dim;
    }

    pub fn add_used_constraint(&mut self, f: Formula) {
        self.used_constraints.insert(f);
    }

    pub fn add_used_constraints(&mut self, fs: impl IntoIterator<Item = Formula>) {
        self.used_constraints.extend(fs);
    }

    pub fn used_constraints(&self) -> &FxHashSet<Formula> {
        &self.used_constraints
    }

    /// Merge another status into this one: union of narrowed dimensions and
    /// used constraints. Boxes are deliberately not joined.
    pub fn inplace_join(&mut self, other: &ContractorStatus) {
        self.output.union_with(&other.output);
        self.used_constraints
            .extend(other.used_constraints.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxsat_interval::Interval;
    use boxsat_symbolic::{Expression, Variable};

    #[test]
    fn inplace_join_unions_output_and_constraints() {
        let x = Variable::continuous("x");
        let b = IntervalBox::new([(x.clone(), Interval::new(0.0, 1.0))]);
        let mut a = ContractorStatus::new(b.clone());
        let mut c = ContractorStatus::new(b);
        a.output_mut().add(0);
        c.add_used_constraint(Formula::leq(Expression::variable(&x), Expression::one()));
        a.inplace_join(&c);
        assert!(a.output().contains(0));
        assert_eq!(a.used_constraints().len(), 1);
        // Joining does not touch the box.
        assert!(!a.box_ref().is_empty());
    }
}
