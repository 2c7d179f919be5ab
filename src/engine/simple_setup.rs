//! Wiring of space, problem definition and planner for one query.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use rand::Rng;

use crate::error::PlannerStatus;
use crate::goal::GoalRegion;
use crate::space::{ModelStateSpace, PlanningState};

use super::planner::default_planner;
use super::{
    PathGeometric, Planner, PlannerAllocator, ProblemDefinition, SpaceInformation,
    StateValidityChecker, TerminationCondition,
};

/// Owns the pieces of a single planning query and drives the planner.
pub struct SimpleSetup {
    si: Arc<SpaceInformation>,
    pdef: Arc<ProblemDefinition>,
    planner: Option<Box<dyn Planner>>,
    allocator: Option<PlannerAllocator>,
    params: HashMap<String, String>,
    configured: bool,
    last_plan_time: Duration,
    last_simplify_time: Duration,
}

impl SimpleSetup {
    pub fn new(space: Arc<ModelStateSpace>, longest_valid_segment_fraction: f64) -> Self {
        Self {
            si: SpaceInformation::new(space, longest_valid_segment_fraction),
            pdef: ProblemDefinition::new(),
            planner: None,
            allocator: None,
            params: HashMap::new(),
            configured: false,
            last_plan_time: Duration::ZERO,
            last_simplify_time: Duration::ZERO,
        }
    }

    pub fn space_information(&self) -> &Arc<SpaceInformation> {
        &self.si
    }

    pub fn problem_definition(&self) -> &Arc<ProblemDefinition> {
        &self.pdef
    }

    pub fn set_start_state(&self, state: PlanningState) {
        self.pdef.set_start_state(state);
    }

    pub fn clear_start_states(&self) {
        self.pdef.clear_start_states();
    }

    pub fn set_goal(&self, goal: Option<Arc<dyn GoalRegion>>) {
        self.pdef.set_goal(goal);
    }

    pub fn goal(&self) -> Option<Arc<dyn GoalRegion>> {
        self.pdef.goal()
    }

    pub fn set_state_validity_checker(&self, checker: Option<Arc<dyn StateValidityChecker>>) {
        self.si.set_state_validity_checker(checker);
    }

    pub fn set_planner_allocator(&mut self, allocator: Option<PlannerAllocator>) {
        self.allocator = allocator;
        self.planner = None;
        self.configured = false;
    }

    pub fn planner_allocator(&self) -> Option<&PlannerAllocator> {
        self.allocator.as_ref()
    }

    /// Engine parameters forwarded to the planner at setup time.
    pub fn set_planner_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
        if let Some(planner) = self.planner.as_mut() {
            planner.set_params(&self.params);
        }
    }

    /// Instantiate the planner (configured allocator or engine
    /// default) and apply parameters. Safe to call repeatedly.
    pub fn setup(&mut self) {
        if self.planner.is_none() {
            let planner = match &self.allocator {
                Some(allocator) => allocator(Arc::clone(&self.si)),
                None => default_planner(&self.si),
            };
            debug!("setup complete, using planner '{}'", planner.name());
            self.planner = Some(planner);
        }
        if let Some(planner) = self.planner.as_mut() {
            planner.set_params(&self.params);
        }
        self.configured = true;
    }

    pub fn solve(&mut self, ptc: &TerminationCondition) -> PlannerStatus {
        if !self.configured {
            self.setup();
        }
        let start = Instant::now();
        let status = self
            .planner
            .as_mut()
            .expect("setup() installs a planner")
            .solve(&self.si, &self.pdef, ptc);
        self.last_plan_time = start.elapsed();
        status
    }

    pub fn last_plan_time(&self) -> Duration {
        self.last_plan_time
    }

    pub fn last_simplify_time(&self) -> Duration {
        self.last_simplify_time
    }

    pub fn have_solution_path(&self) -> bool {
        self.pdef.has_solution()
    }

    pub fn solution_path(&self) -> Option<PathGeometric> {
        self.pdef.solution_path()
    }

    /// Shortcut-simplify the stored solution path within `timeout`.
    pub fn simplify_solution(&mut self, timeout: Duration) {
        let start = Instant::now();
        let ptc = TerminationCondition::with_timeout(timeout);
        let si = Arc::clone(&self.si);
        self.pdef
            .modify_solution_path(|path| shortcut_path(&si, path, &ptc));
        self.last_simplify_time = start.elapsed();
    }

    /// Drop the planner and all solutions; the space and problem
    /// structure survive for reconfiguration.
    pub fn clear(&mut self) {
        self.planner = None;
        self.configured = false;
        self.pdef.clear_solutions();
    }
}

/// Remove path states whose neighbors connect directly, picking the
/// candidate pairs at random.
fn shortcut_path(si: &SpaceInformation, path: &mut PathGeometric, ptc: &TerminationCondition) {
    let mut rng = rand::rng();
    let mut no_improvement = 0;
    while !ptc.is_satisfied() && no_improvement < 50 {
        let n = path.state_count();
        if n < 3 {
            return;
        }
        let i = rng.random_range(0..n - 2);
        let j = rng.random_range(i + 2..n);
        if si.check_motion(&path.states()[i], &path.states()[j]) {
            path.states_mut().drain(i + 1..j);
            no_improvement = 0;
        } else {
            no_improvement += 1;
        }
    }
}
