//! The contractor interface and its composition operators.

use crate::mt::{FwdBwdMt, PolytopeMt};
use crate::status::ContractorStatus;
use boxsat_interval::{DimensionSet, IntervalBox};
use boxsat_symbolic::Formula;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractorKind {
    Id,
    FwdBwd,
    Polytope,
    Seq,
    Join,
    Fixpoint,
}

/// A pruning operator. Implementations are shared read-only across workers;
/// any per-instance mutable state must be held in per-worker slots keyed by
/// the `worker` argument.
pub trait ContractorCell: Send + Sync {
    fn kind(&self) -> ContractorKind;

    /// Contract the box inside `cs`, recording narrowed dimensions in its
    /// output set and contributing constraints in its used set.
    fn prune(&self, cs: &mut ContractorStatus, worker: usize);

    /// Dimensions this contractor may read.
    fn input(&self) -> &DimensionSet;

    /// A dummy contractor never narrows anything.
    fn is_dummy(&self) -> bool {
        false
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

/// Cheap shared handle to a contractor cell.
#[derive(Clone)]
pub struct Contractor(Arc<dyn ContractorCell>);

impl Contractor {
    pub fn from_cell(cell: Arc<dyn ContractorCell>) -> Contractor {
        Contractor(cell)
    }

    /// The no-op contractor.
    pub fn id(dims: usize) -> Contractor {
        Contractor(Arc::new(IdCell {
            input: DimensionSet::new(dims),
        }))
    }

    /// Forward-backward contractor for one atomic constraint, with one inner
    /// instance per worker.
    pub fn fwd_bwd(formula: Formula, bx: &IntervalBox, jobs: usize) -> Contractor {
        Contractor(Arc::new(FwdBwdMt::new(formula, bx, jobs.max(1))))
    }

    /// Polytope-hull contractor for a constraint system, with one inner
    /// instance per worker.
    pub fn polytope(formulas: Vec<Formula>, bx: &IntervalBox, jobs: usize) -> Contractor {
        Contractor(Arc::new(PolytopeMt::new(formulas, bx, jobs.max(1))))
    }

    /// Run children in order, stopping early on an empty box. Dummy children
    /// are elided.
    pub fn seq(children: Vec<Contractor>, dims: usize) -> Contractor {
        let children: Vec<Contractor> =
            children.into_iter().filter(|c| !c.is_dummy()).collect();
        if children.is_empty() {
            return Contractor::id(dims);
        }
        let mut input = DimensionSet::new(dims);
        for c in &children {
            input.union_with(c.input());
        }
        Contractor(Arc::new(SeqCell { children, input }))
    }

    /// Run children on copies of the box and take the intersection of their
    /// results.
    pub fn join(children: Vec<Contractor>, dims: usize) -> Contractor {
        let children: Vec<Contractor> =
            children.into_iter().filter(|c| !c.is_dummy()).collect();
        if children.is_empty() {
            return Contractor::id(dims);
        }
        let mut input = DimensionSet::new(dims);
        for c in &children {
            input.union_with(c.input());
        }
        Contractor(Arc::new(JoinCell { children, input }))
    }

    /// Iterate a child until a sweep no longer shrinks any input dimension by
    /// more than `ratio` of its diameter.
    pub fn fixpoint(child: Contractor, ratio: f64) -> Contractor {
        assert!(ratio > 0.0, "fixpoint ratio must be positive");
        if child.is_dummy() {
            return child;
        }
        let input = child.input().clone();
        Contractor(Arc::new(FixpointCell {
            child,
            ratio,
            input,
        }))
    }

    #[inline]
    pub fn prune(&self, cs: &mut ContractorStatus, worker: usize) {
        self.0.prune(cs, worker)
    }

    #[inline]
    pub fn input(&self) -> &DimensionSet {
        self.0.input()
    }

    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.0.is_dummy()
    }

    #[inline]
    pub fn kind(&self) -> ContractorKind {
        self.0.kind()
    }
}

impl fmt::Display for Contractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display(f)
    }
}

impl fmt::Debug for Contractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display(f)
    }
}

struct IdCell {
    input: DimensionSet,
}

impl ContractorCell for IdCell {
    fn kind(&self) -> ContractorKind {
        ContractorKind::Id
    }

    fn prune(&self, _cs: &mut ContractorStatus, _worker: usize) {}

    fn input(&self) -> &DimensionSet {
        &self.input
    }

    fn is_dummy(&self) -> bool {
        true
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id()")
    }
}

struct SeqCell {
    children: Vec<Contractor>,
    input: DimensionSet,
}

impl ContractorCell for SeqCell {
    fn kind(&self) -> ContractorKind {
        ContractorKind::Seq
    }

    fn prune(&self, cs: &mut ContractorStatus, worker: usize) {
        for child in &self.children {
            child.prune(cs, worker);
            if cs.box_ref().is_empty() {
                return;
            }
        }
    }

    fn input(&self) -> &DimensionSet {
        &self.input
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq(")?;
        for (i, c) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

struct JoinCell {
    children: Vec<Contractor>,
    input: DimensionSet,
}

impl ContractorCell for JoinCell {
    fn kind(&self) -> ContractorKind {
        ContractorKind::Join
    }

    fn prune(&self, cs: &mut ContractorStatus, worker: usize) {
        let base = cs.box_ref().clone();
        let mut result: Option<IntervalBox> = None;
        for child in &self.children {
            let mut st = ContractorStatus::new(base.clone());
            child.prune(&mut st, worker);
            cs.output_mut().union_with(st.output());
            cs.add_used_constraints(st.used_constraints().iter().cloned());
            match &mut result {
                None => result = Some(st.box_ref().clone()),
                Some(r) => r.intersect_with(st.box_ref()),
            }
        }
        if let Some(r) = result {
            *cs.box_mut() = r;
        }
    }

    fn input(&self) -> &DimensionSet {
        &self.input
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Join(")?;
        for (i, c) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

struct FixpointCell {
    child: Contractor,
    ratio: f64,
    input: DimensionSet,
}

// Interval endpoints are finite-precision, so the sweep gain reaches the
// ratio threshold eventually; the cap is a backstop.
const MAX_FIXPOINT_SWEEPS: usize = 1000;

impl ContractorCell for FixpointCell {
    fn kind(&self) -> ContractorKind {
        ContractorKind::Fixpoint
    }

    fn prune(&self, cs: &mut ContractorStatus, worker: usize) {
        for sweep in 0..MAX_FIXPOINT_SWEEPS {
            let before = cs.box_ref().clone();
            self.child.prune(cs, worker);
            if cs.box_ref().is_empty() {
                return;
            }
            let mut gain: f64 = 0.0;
            for dim in self.input.iter() {
                let od = before.get(dim).diam();
                let nd = cs.box_ref().get(dim).diam();
                let g = if od.is_infinite() {
                    if nd.is_finite() {
                        1.0
                    } else {
                        0.0
                    }
                } else if od > 0.0 {
                    (od - nd) / od
                } else {
                    0.0
                };
                gain = gain.max(g);
            }
            if gain < self.ratio {
                trace!(sweep, gain, "fixpoint: converged");
                return;
            }
        }
    }

    fn input(&self) -> &DimensionSet {
        &self.input
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixpoint({})", self.child)
    }
}
