//! Sequential constraint-set planner.
//!
//! Given an ordered chain of constrained samplers S1..Sn and a
//! sampleable goal region, the follower grows n+2 state layers (start
//! states, one layer per sampler, goal states), connects adjacent
//! layers by local motion validation, propagates start-reachability
//! over the recorded forward edges, and extracts a piecewise-valid
//! path once a goal state becomes reachable.

mod pdf;

pub use pdf::DiscretePdf;

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, error, info};
use rand::Rng;

use crate::constraints::ValidConstrainedSampler;
use crate::engine::{
    PathGeometric, ProblemDefinition, Solution, SpaceInformation, TerminationCondition,
};
use crate::error::PlannerStatus;
use crate::goal::{GoalSample, GoalSampleStream};
use crate::space::PlanningState;

/// Layered planner over an ordered list of constrained samplers.
///
/// Created per call; holds no state across calls.
pub struct Follower {
    si: Arc<SpaceInformation>,
    goal_bias: f64,
}

impl Follower {
    pub fn new(si: Arc<SpaceInformation>) -> Self {
        Self {
            si,
            goal_bias: 0.05,
        }
    }

    /// Plan through the sampler chain.
    ///
    /// Layer 0 holds the problem's valid start states and the final
    /// layer holds goal states; layer i (1-based) holds states drawn
    /// from `samplers[i - 1]`. Exactly one solution path is recorded on
    /// success.
    pub fn follow(
        &self,
        samplers: &[Arc<ValidConstrainedSampler>],
        pdef: &Arc<ProblemDefinition>,
        ptc: &TerminationCondition,
    ) -> PlannerStatus {
        let goal = match pdef.goal() {
            Some(goal) => goal,
            None => {
                error!("the goal region must be sampleable");
                return PlannerStatus::UnrecognizedGoalType;
            }
        };

        let n = samplers.len();
        let mut sets: Vec<Vec<PlanningState>> = vec![Vec::new(); n + 2];

        for state in pdef.start_states() {
            if self.si.is_valid(&state) {
                sets[0].push(state);
            }
        }
        if sets[0].is_empty() {
            error!("no valid start states found");
            return PlannerStatus::InvalidStart;
        }

        let mut work = PlanningState::zeros(self.si.space().dimension());

        // Seed every sampler layer with at least one valid state. The
        // most recent state of the previous layer is projected into the
        // region first, with a fresh draw as fallback.
        for i in 0..n {
            if ptc.is_satisfied() {
                break;
            }
            while sets[i + 1].is_empty() && !ptc.is_satisfied() {
                let produced = if sets[i].is_empty() {
                    samplers[i].sample(&mut work)
                } else {
                    work = sets[i].last().unwrap().clone();
                    samplers[i].project(&mut work) || samplers[i].sample(&mut work)
                };
                if produced && self.si.is_valid(&work) {
                    sets[i + 1].push(work.clone());
                }
            }
        }

        if ptc.is_satisfied() {
            log_layer_counts(&sets);
            info!("unable to compute follow plan");
            return PlannerStatus::Timeout;
        }

        // Seed the goal layer.
        let mut goal_stream = GoalSampleStream::new(Arc::clone(&goal));
        match goal_stream.next(&self.si, ptc) {
            Some(state) => sets[n + 1].push(state),
            None => {
                error!("unable to sample any valid states for goal tree");
                log_layer_counts(&sets);
                info!("unable to compute follow plan");
                return PlannerStatus::InvalidGoal;
            }
        }

        // Forward edges: connections[i][j] lists the states in layer
        // i + 1 reachable from state j of layer i by a valid motion.
        let mut connections: Vec<Vec<Vec<usize>>> =
            (0..=n).map(|i| vec![Vec::new(); sets[i].len()]).collect();

        // First-sample heuristic: the chain of first states may already
        // connect all the way through.
        let mut first_sample_worked = true;
        for i in 0..=n {
            if self.si.check_motion(&sets[i][0], &sets[i + 1][0]) {
                connections[i][0].push(0);
            } else {
                first_sample_worked = false;
            }
        }

        let result = if first_sample_worked {
            debug!("first samples were successfully connected for all sets of constraints");
            compute_solution(&sets, &connections, pdef);
            PlannerStatus::ExactSolution
        } else {
            self.expand_incrementally(
                samplers,
                &mut sets,
                &mut connections,
                &mut goal_stream,
                &mut work,
                pdef,
                ptc,
            )
        };

        log_layer_counts(&sets);
        if result.is_exact() {
            info!("successfully computed follow plan");
        } else {
            info!("unable to compute follow plan");
        }
        result
    }

    /// Grow the sparser layers until a goal state becomes reachable
    /// from a start state, or the termination condition fires.
    #[allow(clippy::too_many_arguments)]
    fn expand_incrementally(
        &self,
        samplers: &[Arc<ValidConstrainedSampler>],
        sets: &mut Vec<Vec<PlanningState>>,
        connections: &mut Vec<Vec<Vec<usize>>>,
        goal_stream: &mut GoalSampleStream,
        work: &mut PlanningState,
        pdef: &Arc<ProblemDefinition>,
        ptc: &TerminationCondition,
    ) -> PlannerStatus {
        let goal_index = sets.len() - 1;
        let weight_offset = 1.0 / sets.len() as f64;

        // Sparser layers carry more weight so they receive more draws.
        let mut pdf = DiscretePdf::new();
        for (i, set) in sets.iter().enumerate().skip(1) {
            pdf.add(i, 1.0 / (weight_offset + set.len() as f64));
        }

        // Remaining start states may also connect into the chain.
        for i in 1..sets[0].len() {
            if self.si.check_motion(&sets[0][i], &sets[1][0]) {
                connections[0][i].push(0);
            }
        }

        let mut is_start: Vec<Vec<bool>> = sets.iter().map(|s| vec![false; s.len()]).collect();
        for flag in is_start[0].iter_mut() {
            *flag = true;
        }
        for i in 0..sets[0].len() {
            propagate_start_info(0, i, &mut is_start, connections);
        }

        let mut rng = rand::rng();
        let mut adding_goals = true;
        let mut solved = is_start[goal_index].iter().any(|&s| s);

        while !ptc.is_satisfied() && !solved {
            let mut added = false;
            let mut index = pdf.sample(rng.random());

            if index == goal_index || (adding_goals && rng.random::<f64>() < self.goal_bias) {
                index = goal_index;
                match goal_stream.try_next(&self.si) {
                    GoalSample::Ready(state) => {
                        sets[goal_index].push(state);
                        is_start[goal_index].push(false);
                        pdf.update(
                            goal_index - 1,
                            1.0 / (weight_offset + sets[goal_index].len() as f64),
                        );
                        added = true;
                    }
                    GoalSample::Exhausted => adding_goals = false,
                    GoalSample::Pending => {}
                }
            } else if samplers[index - 1].sample(work) && self.si.is_valid(work) {
                sets[index].push(work.clone());
                connections[index].push(Vec::new());
                is_start[index].push(false);
                pdf.update(index - 1, 1.0 / (weight_offset + sets[index].len() as f64));
                added = true;
            }

            if added {
                let added_elem = sets[index].len() - 1;

                for i in 0..sets[index - 1].len() {
                    if self.si.check_motion(&sets[index - 1][i], &sets[index][added_elem]) {
                        connections[index - 1][i].push(added_elem);
                        if is_start[index - 1][i] && !is_start[index][added_elem] {
                            is_start[index][added_elem] = true;
                            propagate_start_info(index, added_elem, &mut is_start, connections);
                        }
                    }
                }

                if index < goal_index {
                    for i in 0..sets[index + 1].len() {
                        if self.si.check_motion(&sets[index][added_elem], &sets[index + 1][i]) {
                            connections[index][added_elem].push(i);
                            if is_start[index][added_elem] && !is_start[index + 1][i] {
                                is_start[index + 1][i] = true;
                                propagate_start_info(index + 1, i, &mut is_start, connections);
                            }
                        }
                    }
                }

                solved = is_start[goal_index].iter().any(|&s| s);
            }
        }

        if solved {
            compute_solution(sets, connections, pdef);
            PlannerStatus::ExactSolution
        } else {
            PlannerStatus::Timeout
        }
    }
}

/// Mark every state forward-reachable from the given state as
/// start-reachable. Breadth-first with a work queue; reachability is
/// monotonic, so each state is enqueued at most once.
fn propagate_start_info(
    set_index: usize,
    elem_index: usize,
    is_start: &mut [Vec<bool>],
    connections: &[Vec<Vec<usize>>],
) {
    let mut queue = VecDeque::new();
    queue.push_back((set_index, elem_index));
    while let Some((set, elem)) = queue.pop_front() {
        if set >= connections.len() {
            continue;
        }
        for &next in &connections[set][elem] {
            if !is_start[set + 1][next] {
                is_start[set + 1][next] = true;
                queue.push_back((set + 1, next));
            }
        }
    }
}

/// Depth-first search over the forward edges from a start state to the
/// goal layer, recording states on the unwind so the reversed path
/// runs start to goal. Exactly one path is recorded.
fn compute_solution(
    sets: &[Vec<PlanningState>],
    connections: &[Vec<Vec<usize>>],
    pdef: &Arc<ProblemDefinition>,
) {
    let mut path = PathGeometric::new();
    let mut found = false;
    for i in 0..sets[0].len() {
        if find_solution_path(&mut path, 0, i, sets, connections) {
            found = true;
            break;
        }
    }
    if found {
        path.reverse();
        pdef.add_solution(Solution {
            path,
            approximate: false,
            planner: "Follower".to_string(),
        });
    }
}

fn find_solution_path(
    path: &mut PathGeometric,
    set_index: usize,
    elem_index: usize,
    sets: &[Vec<PlanningState>],
    connections: &[Vec<Vec<usize>>],
) -> bool {
    if set_index == connections.len() {
        // Reached the goal layer.
        path.append(sets[set_index][elem_index].clone());
        return true;
    }
    for &next in &connections[set_index][elem_index] {
        if find_solution_path(path, set_index + 1, next, sets, connections) {
            path.append(sets[set_index][elem_index].clone());
            return true;
        }
    }
    false
}

fn log_layer_counts(sets: &[Vec<PlanningState>]) {
    for (i, set) in sets.iter().enumerate() {
        debug!("computed {} samples for constraint set {}", set.len(), i);
    }
}
