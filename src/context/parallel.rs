//! Parallel solve scheduling: multiple planner instances in
//! bounded-thread batches sharing one termination condition.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use log::{debug, error};

use crate::engine::planner::default_planner;
use crate::engine::{PlannerAllocator, ProblemDefinition, SpaceInformation, TerminationCondition};

/// Runs `count` planner instances, at most `max_threads` at a time.
///
/// Within a batch, success means at least one planner found an exact
/// solution. Across batches the results combine per the configured
/// policy: all batches must succeed, or any one of them.
pub struct ParallelSolveScheduler {
    si: Arc<SpaceInformation>,
    pdef: Arc<ProblemDefinition>,
    allocator: Option<PlannerAllocator>,
    max_threads: u32,
    require_all_batches: bool,
}

impl ParallelSolveScheduler {
    pub fn new(
        si: Arc<SpaceInformation>,
        pdef: Arc<ProblemDefinition>,
        allocator: Option<PlannerAllocator>,
        max_threads: u32,
        require_all_batches: bool,
    ) -> Self {
        Self {
            si,
            pdef,
            allocator,
            max_threads: max_threads.max(1),
            require_all_batches,
        }
    }

    pub fn solve(&self, count: u32, ptc: &Arc<TerminationCondition>) -> bool {
        if count <= self.max_threads {
            return self.run_batch(count, ptc);
        }

        let mut result = self.require_all_batches;
        let full_batches = count / self.max_threads;
        for batch in 0..full_batches {
            if ptc.is_satisfied() {
                break;
            }
            debug!(
                "running solve batch {}/{} of size {}",
                batch + 1,
                full_batches,
                self.max_threads
            );
            let r = self.run_batch(self.max_threads, ptc);
            result = self.combine(result, r);
        }

        let remainder = count % self.max_threads;
        if remainder > 0 && !ptc.is_satisfied() {
            debug!("running final solve batch of size {}", remainder);
            let r = self.run_batch(remainder, ptc);
            result = self.combine(result, r);
        }
        result
    }

    fn combine(&self, acc: bool, batch: bool) -> bool {
        if self.require_all_batches {
            acc && batch
        } else {
            acc || batch
        }
    }

    /// Launch `n` fresh planner instances and wait for all of them.
    /// A panicked planner thread counts as a failed attempt.
    fn run_batch(&self, n: u32, ptc: &Arc<TerminationCondition>) -> bool {
        let (tx, rx) = bounded::<bool>(n as usize);
        let mut handles = Vec::with_capacity(n as usize);

        for i in 0..n {
            let si = Arc::clone(&self.si);
            let pdef = Arc::clone(&self.pdef);
            let ptc = Arc::clone(ptc);
            let allocator = self.allocator.clone();
            let tx = tx.clone();

            let spawned = thread::Builder::new()
                .name(format!("solve-{}", i))
                .spawn(move || {
                    let mut planner = match &allocator {
                        Some(allocator) => allocator(Arc::clone(&si)),
                        None => default_planner(&si),
                    };
                    let status = planner.solve(&si, &pdef, &ptc);
                    let _ = tx.send(status.is_exact());
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!("failed to spawn solve thread: {}", e),
            }
        }
        drop(tx);

        let mut any_exact = false;
        for exact in rx.iter() {
            any_exact = any_exact || exact;
        }
        for handle in handles {
            if handle.join().is_err() {
                error!("planner thread panicked");
            }
        }
        any_exact
    }
}
