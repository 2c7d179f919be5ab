//! Problem definition: start states, goal, and the shared solution set.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::goal::GoalRegion;
use crate::space::PlanningState;

use super::PathGeometric;

/// One solution produced by a planner.
#[derive(Clone, Debug)]
pub struct Solution {
    pub path: PathGeometric,
    pub approximate: bool,
    pub planner: String,
}

/// Shared description of one planning query. Planner threads add
/// solutions concurrently; the solution set visible after a solve
/// returns reflects exactly that invocation.
#[derive(Default)]
pub struct ProblemDefinition {
    start_states: RwLock<Vec<PlanningState>>,
    goal: RwLock<Option<Arc<dyn GoalRegion>>>,
    solutions: Mutex<Vec<Solution>>,
}

impl ProblemDefinition {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_start_state(&self, state: PlanningState) {
        self.start_states.write().push(state);
    }

    /// Replace all start states with a single one.
    pub fn set_start_state(&self, state: PlanningState) {
        let mut starts = self.start_states.write();
        starts.clear();
        starts.push(state);
    }

    pub fn clear_start_states(&self) {
        self.start_states.write().clear();
    }

    pub fn start_states(&self) -> Vec<PlanningState> {
        self.start_states.read().clone()
    }

    pub fn set_goal(&self, goal: Option<Arc<dyn GoalRegion>>) {
        *self.goal.write() = goal;
    }

    pub fn goal(&self) -> Option<Arc<dyn GoalRegion>> {
        self.goal.read().clone()
    }

    pub fn add_solution(&self, solution: Solution) {
        self.solutions.lock().push(solution);
    }

    pub fn clear_solutions(&self) {
        self.solutions.lock().clear();
    }

    pub fn has_solution(&self) -> bool {
        !self.solutions.lock().is_empty()
    }

    pub fn has_exact_solution(&self) -> bool {
        self.solutions.lock().iter().any(|s| !s.approximate)
    }

    /// True when solutions exist but none is exact.
    pub fn has_approximate_solution(&self) -> bool {
        let solutions = self.solutions.lock();
        !solutions.is_empty() && solutions.iter().all(|s| s.approximate)
    }

    /// The best solution path: the first exact one, otherwise the
    /// first approximate one.
    pub fn solution_path(&self) -> Option<PathGeometric> {
        let solutions = self.solutions.lock();
        solutions
            .iter()
            .find(|s| !s.approximate)
            .or_else(|| solutions.first())
            .map(|s| s.path.clone())
    }

    /// Mutate the best solution path in place (used by simplification
    /// and interpolation).
    pub fn modify_solution_path(&self, f: impl FnOnce(&mut PathGeometric)) -> bool {
        let mut solutions = self.solutions.lock();
        let index = solutions
            .iter()
            .position(|s| !s.approximate)
            .or(if solutions.is_empty() { None } else { Some(0) });
        match index {
            Some(i) => {
                f(&mut solutions[i].path);
                true
            }
            None => false,
        }
    }
}
