//! Benchmark harness: repeated planner runs with persisted results.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use crate::error::PlannerStatus;

use super::planner::default_planner;
use super::{PlannerAllocator, ProblemDefinition, SpaceInformation, TerminationCondition};

/// Parameters for one benchmark experiment.
#[derive(Clone, Debug)]
pub struct BenchmarkRequest {
    /// Time budget per run, in seconds.
    pub max_time: f64,
    pub run_count: u32,
    pub display_progress: bool,
}

#[derive(Clone, Debug)]
struct BenchmarkRecord {
    run: u32,
    status: PlannerStatus,
    planning_time: Duration,
    path_length: Option<f64>,
}

/// Runs the configured planner repeatedly and persists per-run records.
pub struct Benchmark {
    experiment: String,
    records: Vec<BenchmarkRecord>,
}

impl Benchmark {
    pub fn new(experiment: &str) -> Self {
        Self {
            experiment: experiment.to_string(),
            records: Vec::new(),
        }
    }

    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    pub fn run_count(&self) -> usize {
        self.records.len()
    }

    /// Execute the experiment. Each run gets a fresh planner instance
    /// and a cleared solution set.
    pub fn run(
        &mut self,
        si: &Arc<SpaceInformation>,
        pdef: &Arc<ProblemDefinition>,
        allocator: Option<&PlannerAllocator>,
        request: &BenchmarkRequest,
    ) {
        let lazy_goal = pdef.goal().filter(|g| g.has_lazy_samples());
        if let Some(goal) = &lazy_goal {
            goal.start_sampling();
        }
        for run in 0..request.run_count {
            pdef.clear_solutions();
            let mut planner = match allocator {
                Some(allocator) => allocator(Arc::clone(si)),
                None => default_planner(si),
            };
            let ptc = TerminationCondition::with_timeout(Duration::from_secs_f64(request.max_time));
            let start = Instant::now();
            let status = planner.solve(si, pdef, &ptc);
            let planning_time = start.elapsed();
            let path_length = pdef.solution_path().map(|p| p.length(si.space()));

            if request.display_progress {
                info!(
                    "{}: run {}/{}: {} in {:.3}s",
                    self.experiment,
                    run + 1,
                    request.run_count,
                    status,
                    planning_time.as_secs_f64()
                );
            }
            self.records.push(BenchmarkRecord {
                run,
                status,
                planning_time,
                path_length,
            });
        }
        if let Some(goal) = &lazy_goal {
            goal.stop_sampling();
        }
    }

    /// Default results location derived from the experiment name.
    pub fn default_filename(&self) -> String {
        format!("{}_benchmark.csv", self.experiment.replace(' ', "_"))
    }

    /// Write records as CSV with a one-line experiment header.
    pub fn save_results_to_file(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        writeln!(file, "# experiment: {}", self.experiment)?;
        writeln!(file, "run,status,planning_time_s,path_length")?;
        for r in &self.records {
            writeln!(
                file,
                "{},{},{:.6},{}",
                r.run,
                r.status,
                r.planning_time.as_secs_f64(),
                r.path_length
                    .map(|l| format!("{:.6}", l))
                    .unwrap_or_else(|| "-".to_string())
            )?;
        }
        Ok(())
    }
}
