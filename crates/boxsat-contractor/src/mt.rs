//! Per-worker instancing for contractors with mutable scratch state.
//!
//! A slot array holds one lazily built inner contractor per worker id. Each
//! slot is written only by the worker that owns it, so the mutex is never
//! contended; it is taken with `try_lock` and a failure is a violation of the
//! single-writer invariant, which is fatal.

use crate::contractor::{ContractorCell, ContractorKind};
use crate::fwdbwd::FwdBwd;
use crate::polytope::Polytope;
use crate::status::ContractorStatus;
use boxsat_interval::{DimensionSet, IntervalBox};
use boxsat_symbolic::Formula;
use std::fmt;
use std::sync::{Mutex, OnceLock};

pub(crate) struct SlotArray<T> {
    slots: Box<[OnceLock<Mutex<T>>]>,
}

impl<T> SlotArray<T> {
    /// `jobs` slots, with slot 0 built eagerly from `first`.
    fn new(jobs: usize, first: T) -> SlotArray<T> {
        assert!(jobs >= 1, "slot array requires at least one worker");
        let slots: Box<[OnceLock<Mutex<T>>]> = (0..jobs).map(|_| OnceLock::new()).collect();
        assert!(slots[0].set(Mutex::new(first)).is_ok());
        SlotArray { slots }
    }

    fn with<R>(
        &self,
        worker: usize,
        init: impl FnOnce() -> T,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        let slot = self.slots.get(worker).unwrap_or_else(|| {
            panic!(
                "worker id {worker} exceeds the configured job count {}",
                self.slots.len()
            )
        });
        let lock = slot.get_or_init(|| Mutex::new(init()));
        let mut inner = lock
            .try_lock()
            .expect("contractor slot accessed by two workers at once");
        f(&mut inner)
    }
}

/// [`FwdBwd`] behind one slot per worker.
pub(crate) struct FwdBwdMt {
    formula: Formula,
    template: IntervalBox,
    slots: SlotArray<FwdBwd>,
    input: DimensionSet,
    dummy: bool,
}

impl FwdBwdMt {
    pub(crate) fn new(formula: Formula, bx: &IntervalBox, jobs: usize) -> FwdBwdMt {
        let first = FwdBwd::new(formula.clone(), bx);
        let input = first.input().clone();
        let dummy = first.is_dummy();
        FwdBwdMt {
            formula,
            template: bx.clone(),
            slots: SlotArray::new(jobs, first),
            input,
            dummy,
        }
    }
}

impl ContractorCell for FwdBwdMt {
    fn kind(&self) -> ContractorKind {
        ContractorKind::FwdBwd
    }

    fn prune(&self, cs: &mut ContractorStatus, worker: usize) {
        if self.dummy {
            return;
        }
        self.slots.with(
            worker,
            || FwdBwd::new(self.formula.clone(), &self.template),
            |ctc| ctc.prune(cs),
        )
    }

    fn input(&self) -> &DimensionSet {
        &self.input
    }

    fn is_dummy(&self) -> bool {
        self.dummy
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FwdBwd({})", self.formula)
    }
}

/// [`Polytope`] behind one slot per worker.
pub(crate) struct PolytopeMt {
    formulas: Vec<Formula>,
    template: IntervalBox,
    slots: SlotArray<Polytope>,
    input: DimensionSet,
    dummy: bool,
}

impl PolytopeMt {
    pub(crate) fn new(formulas: Vec<Formula>, bx: &IntervalBox, jobs: usize) -> PolytopeMt {
        let first = Polytope::new(formulas.clone(), bx);
        let input = first.input().clone();
        let dummy = first.is_dummy();
        PolytopeMt {
            formulas,
            template: bx.clone(),
            slots: SlotArray::new(jobs, first),
            input,
            dummy,
        }
    }
}

impl ContractorCell for PolytopeMt {
    fn kind(&self) -> ContractorKind {
        ContractorKind::Polytope
    }

    fn prune(&self, cs: &mut ContractorStatus, worker: usize) {
        if self.dummy {
            return;
        }
        self.slots.with(
            worker,
            || Polytope::new(self.formulas.clone(), &self.template),
            |ctc| ctc.prune(cs),
        )
    }

    fn input(&self) -> &DimensionSet {
        &self.input
    }

    fn is_dummy(&self) -> bool {
        self.dummy
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polytope(")?;
        for fm in &self.formulas {
            write!(f, "{fm};")?;
        }
        write!(f, ")")
    }
}
