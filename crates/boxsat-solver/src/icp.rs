//! Sequential branch-and-prune driver.

use crate::branch::{branch_gradient_descent, branch_max_diam, ErrorTerm};
use crate::config::{BranchingStrategy, Config};
use crate::error::SolverError;
use crate::stat::IcpStats;
use boxsat_contractor::{Contractor, ContractorStatus};
use boxsat_eval::{EvaluationKind, FormulaEvaluator};
use boxsat_interval::{DimensionSet, IntervalBox};
use std::time::Instant;
use tracing::debug;

/// Evaluate every constraint on the status box.
///
/// Returns `None` when some constraint refutes the box (the box is emptied
/// and the refuting constraint recorded); otherwise the set of branching
/// candidates: bisectable free dimensions of constraints whose evaluation is
/// still wider than `precision`. An empty candidate set means the box is a
/// δ-SAT witness.
pub(crate) fn evaluate_box(
    evaluators: &[FormulaEvaluator],
    precision: f64,
    cs: &mut ContractorStatus,
) -> Option<DimensionSet> {
    let mut candidates = DimensionSet::new(cs.box_ref().size());
    for evaluator in evaluators {
        let result = evaluator
            .evaluate(cs.box_ref())
            .expect("formula evaluator variables must be dimensions of the box");
        match result.kind {
            EvaluationKind::Unsat => {
                debug!(constraint = %evaluator, evaluation = %result.evaluation,
                       "box refuted by evaluation");
                cs.box_mut().set_empty();
                cs.add_used_constraint(evaluator.formula().clone());
                return None;
            }
            EvaluationKind::Valid => {}
            EvaluationKind::Unknown => {
                if result.evaluation.diam() > precision {
                    for v in evaluator.variables() {
                        if let Some(i) = cs.box_ref().index_of(v) {
                            if cs.box_ref().get(i).is_bisectable() {
                                candidates.add(i);
                            }
                        }
                    }
                }
            }
        }
    }
    Some(candidates)
}

pub(crate) fn error_terms(
    strategy: BranchingStrategy,
    evaluators: &[FormulaEvaluator],
) -> Vec<ErrorTerm> {
    match strategy {
        BranchingStrategy::MaxDiam => Vec::new(),
        BranchingStrategy::GradientDescent => evaluators
            .iter()
            .filter_map(|ev| ErrorTerm::from_formula(ev.formula()))
            .collect(),
    }
}

/// Sequential ICP engine.
pub struct Icp {
    config: Config,
    stats: IcpStats,
}

impl Icp {
    pub fn new(config: Config) -> Icp {
        Icp {
            config,
            stats: IcpStats::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Statistics accumulated over all `check_sat` calls on this engine.
    pub fn stats(&self) -> &IcpStats {
        &self.stats
    }

    /// Search for a δ-SAT sub-box of `cs`'s box. On success the witness is
    /// left in `cs`; on failure every box was refuted.
    pub fn check_sat(
        &mut self,
        contractor: &Contractor,
        evaluators: &[FormulaEvaluator],
        cs: &mut ContractorStatus,
    ) -> Result<bool, SolverError> {
        let mut stack_left_box_first = self.config.stack_left_box_first;
        let terms = error_terms(self.config.branching_strategy, evaluators);
        let mut stack: Vec<(IntervalBox, i64)> = vec![(cs.box_ref().clone(), -1)];

        while let Some((bx, branching_point)) = stack.pop() {
            *cs.box_mut() = bx;
            cs.set_branching_point(branching_point);

            let t = Instant::now();
            contractor.prune(cs, 0);
            self.stats.prune_ns += t.elapsed().as_nanos() as u64;
            self.stats.prunes += 1;
            if cs.box_ref().is_empty() {
                continue;
            }

            let t = Instant::now();
            let candidates = evaluate_box(evaluators, self.config.precision, cs);
            self.stats.eval_ns += t.elapsed().as_nanos() as u64;
            let Some(candidates) = candidates else {
                continue;
            };
            if candidates.is_empty() {
                debug!(delta_box = %cs.box_ref(), "found a delta-box");
                return Ok(true);
            }

            let t = Instant::now();
            self.stats.branches += 1;
            let leaf = match self.config.branching_strategy {
                BranchingStrategy::MaxDiam => {
                    let leaf = branch_max_diam(
                        cs.box_ref(),
                        &candidates,
                        stack_left_box_first,
                        &mut stack,
                    );
                    stack_left_box_first = !stack_left_box_first;
                    leaf
                }
                BranchingStrategy::GradientDescent => {
                    branch_gradient_descent(&terms, &candidates, cs.box_ref(), &mut stack)
                }
            };
            self.stats.branch_ns += t.elapsed().as_nanos() as u64;
            if leaf {
                return Ok(true);
            }
        }
        debug!("search exhausted: unsat");
        Ok(false)
    }
}
