//! Work-sharing parallel branch-and-prune driver.
//!
//! A fixed pool of symmetric workers pops boxes from a shared lock-free
//! stack, prunes and evaluates them, and on a branch keeps one half in hand
//! while pushing the other. `number_of_boxes` counts boxes on the stack plus
//! boxes in workers' hands: it is incremented by every push and decremented
//! only when a box is refuted, so observing zero with acquire ordering means
//! the whole search space has been covered.

use crate::branch::find_max_diam;
use crate::config::Config;
use crate::error::SolverError;
use crate::icp::evaluate_box;
use crate::interrupt;
use crate::stat::IcpStats;
use boxsat_contractor::{Contractor, ContractorStatus};
use boxsat_eval::FormulaEvaluator;
use boxsat_interval::{DimensionSet, IntervalBox};
use crossbeam_deque::{Injector, Steal};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, trace};

/// One bisection round: split up to `n − |boxes|` of the boxes at their
/// widest bisectable dimension, carry the rest.
fn double_up(boxes: &[IntervalBox], n: usize) -> Vec<IntervalBox> {
    debug_assert!(boxes.len() <= n);
    let mut ret = Vec::with_capacity(n);
    let mut i = 0;
    while i < n - boxes.len() && i < boxes.len() {
        match boxes[i].max_diam() {
            Some((dim, _)) => {
                let (left, right) = boxes[i].bisect(dim);
                ret.push(left);
                ret.push(right);
            }
            None => ret.push(boxes[i].clone()),
        }
        i += 1;
    }
    while i < boxes.len() {
        ret.push(boxes[i].clone());
        i += 1;
    }
    ret
}

/// Grow the root box into up to `n` boxes by repeated doubling.
fn fill_up(root: IntervalBox, n: usize) -> Vec<IntervalBox> {
    let mut ret = vec![root];
    while ret.len() < n {
        let doubled = double_up(&ret, n);
        if doubled.len() == ret.len() {
            break;
        }
        ret = doubled;
    }
    ret
}

struct Shared<'a> {
    contractor: &'a Contractor,
    config: &'a Config,
    evaluators: &'a [FormulaEvaluator],
    global_stack: &'a Injector<IntervalBox>,
    /// Winning worker id; −1 until the first δ-box is published.
    found_delta_sat: &'a AtomicI64,
    number_of_boxes: &'a AtomicI64,
    interrupted: &'a AtomicBool,
}

fn publish_delta_sat(shared: &Shared<'_>, id: usize) {
    let _ = shared.found_delta_sat.compare_exchange(
        -1,
        id as i64,
        Ordering::AcqRel,
        Ordering::Acquire,
    );
}

/// Bisect the widest candidate: one half goes to the shared stack, the other
/// stays in the worker's hands (net one new outstanding box). Returns `false`
/// when no candidate is bisectable.
fn parallel_branch(
    candidates: &DimensionSet,
    stack_left_box_first: bool,
    cs: &mut ContractorStatus,
    shared: &Shared<'_>,
) -> bool {
    let Some((dim, _)) = find_max_diam(cs.box_ref(), candidates) else {
        return false;
    };
    let (left, right) = cs.box_ref().bisect(dim);
    let (to_push, to_keep) = if stack_left_box_first {
        (left, right)
    } else {
        (right, left)
    };
    shared.number_of_boxes.fetch_add(1, Ordering::Relaxed);
    shared.global_stack.push(to_push);
    *cs.box_mut() = to_keep;
    cs.set_branching_point(dim as i64);
    true
}

fn worker(shared: &Shared<'_>, id: usize, cs: &mut ContractorStatus) -> IcpStats {
    let mut stats = IcpStats::default();
    let mut stack_left_box_first = shared.config.stack_left_box_first;
    let mut need_to_pop = true;

    while shared.found_delta_sat.load(Ordering::Acquire) == -1
        && shared.number_of_boxes.load(Ordering::Acquire) > 0
    {
        if interrupt::is_interrupted() || shared.interrupted.load(Ordering::Relaxed) {
            shared.interrupted.store(true, Ordering::Release);
            return stats;
        }

        if need_to_pop {
            match shared.global_stack.steal() {
                Steal::Success(bx) => *cs.box_mut() = bx,
                Steal::Empty => {
                    // Remaining boxes are in other workers' hands.
                    thread::yield_now();
                    continue;
                }
                Steal::Retry => continue,
            }
        }
        need_to_pop = true;

        let t = Instant::now();
        shared.contractor.prune(cs, id);
        stats.prune_ns += t.elapsed().as_nanos() as u64;
        stats.prunes += 1;
        if cs.box_ref().is_empty() {
            shared.number_of_boxes.fetch_sub(1, Ordering::AcqRel);
            trace!(worker = id, "box empty after pruning");
            continue;
        }

        let t = Instant::now();
        let candidates = evaluate_box(shared.evaluators, shared.config.precision, cs);
        stats.eval_ns += t.elapsed().as_nanos() as u64;
        let Some(candidates) = candidates else {
            shared.number_of_boxes.fetch_sub(1, Ordering::AcqRel);
            continue;
        };
        if candidates.is_empty() {
            debug!(worker = id, "found a delta-box");
            publish_delta_sat(shared, id);
            return stats;
        }

        let t = Instant::now();
        stats.branches += 1;
        let branched = parallel_branch(&candidates, stack_left_box_first, cs, shared);
        stats.branch_ns += t.elapsed().as_nanos() as u64;
        if !branched {
            debug!(worker = id, "box above delta but not bisectable; treating as delta-box");
            publish_delta_sat(shared, id);
            return stats;
        }
        need_to_pop = false;
        stack_left_box_first = !stack_left_box_first;
    }
    stats
}

/// Parallel ICP engine with `config.number_of_jobs` symmetric workers; the
/// calling thread participates as the last worker.
pub struct IcpParallel {
    config: Config,
    stats: IcpStats,
}

impl IcpParallel {
    pub fn new(config: Config) -> IcpParallel {
        IcpParallel {
            config,
            stats: IcpStats::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Statistics merged over all workers of all `check_sat` calls.
    pub fn stats(&self) -> &IcpStats {
        &self.stats
    }

    /// Search for a δ-SAT sub-box. On success `cs` carries the winning
    /// worker's box; on failure `cs`'s box is set empty. All workers' output
    /// dimensions and used constraints are joined into `cs`.
    pub fn check_sat(
        &mut self,
        contractor: &Contractor,
        evaluators: &[FormulaEvaluator],
        cs: &mut ContractorStatus,
    ) -> Result<bool, SolverError> {
        let n = self.config.number_of_jobs.max(1);

        // Initial prune on the calling thread.
        contractor.prune(cs, n - 1);
        if cs.box_ref().is_empty() {
            return Ok(false);
        }

        let global_stack = Injector::new();
        let number_of_boxes = AtomicI64::new(0);
        for bx in fill_up(cs.box_ref().clone(), n) {
            global_stack.push(bx);
            number_of_boxes.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            initial_boxes = number_of_boxes.load(Ordering::Relaxed),
            workers = n,
            "starting parallel search"
        );

        let found_delta_sat = AtomicI64::new(-1);
        let interrupted = AtomicBool::new(false);
        let shared = Shared {
            contractor,
            config: &self.config,
            evaluators,
            global_stack: &global_stack,
            found_delta_sat: &found_delta_sat,
            number_of_boxes: &number_of_boxes,
            interrupted: &interrupted,
        };

        let mut statuses: Vec<ContractorStatus> = (0..n).map(|_| cs.clone()).collect();
        let mut worker_stats: Vec<IcpStats> = Vec::with_capacity(n);
        {
            let (spawned, caller_slot) = statuses.split_at_mut(n - 1);
            thread::scope(|scope| {
                let mut handles = Vec::with_capacity(n - 1);
                for (id, st) in spawned.iter_mut().enumerate() {
                    let shared = &shared;
                    handles.push(scope.spawn(move || worker(shared, id, st)));
                }
                worker_stats.push(worker(&shared, n - 1, &mut caller_slot[0]));
                for handle in handles {
                    worker_stats.push(handle.join().expect("icp worker panicked"));
                }
            });
        }

        for ws in &worker_stats {
            self.stats.merge(ws);
        }
        for st in &statuses {
            cs.inplace_join(st);
        }

        if interrupted.load(Ordering::Acquire) {
            return Err(SolverError::Interrupted);
        }
        let winner = found_delta_sat.load(Ordering::Acquire);
        if winner >= 0 {
            *cs.box_mut() = statuses[winner as usize].box_ref().clone();
            Ok(true)
        } else {
            cs.box_mut().set_empty();
            Ok(false)
        }
    }
}
