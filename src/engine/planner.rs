//! Planner contract and the goal-biased RRT used as the engine default.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use rand::Rng;

use crate::error::PlannerStatus;
use crate::goal::{GoalSample, GoalSampleStream};
use crate::space::PlanningState;

use super::{PathGeometric, ProblemDefinition, Solution, SpaceInformation, TerminationCondition};

/// A single planner instance, used for one or more solve attempts on
/// the same problem definition.
pub trait Planner: Send {
    fn name(&self) -> &str;

    /// Apply string-typed engine parameters. Unknown keys are logged
    /// and ignored.
    fn set_params(&mut self, params: &HashMap<String, String>);

    /// Attempt to solve; solutions are added to the problem definition.
    fn solve(
        &mut self,
        si: &Arc<SpaceInformation>,
        pdef: &Arc<ProblemDefinition>,
        ptc: &TerminationCondition,
    ) -> PlannerStatus;
}

/// Constructs a fresh planner instance for a space.
pub type PlannerAllocator = Arc<dyn Fn(Arc<SpaceInformation>) -> Box<dyn Planner> + Send + Sync>;

/// The engine default planner for sampleable goal regions.
pub fn default_planner(_si: &Arc<SpaceInformation>) -> Box<dyn Planner> {
    Box::new(RrtPlanner::new("RRT"))
}

struct TreeNode {
    state: PlanningState,
    parent: Option<usize>,
}

/// Goal-biased rapidly-exploring random tree.
pub struct RrtPlanner {
    name: String,
    goal_bias: f64,
    /// Maximum extension distance; zero selects a fraction of the
    /// space extent at solve time.
    range: f64,
}

impl RrtPlanner {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            goal_bias: 0.05,
            range: 0.0,
        }
    }

    pub fn with_range(mut self, range: f64) -> Self {
        self.range = range;
        self
    }

    fn extract_path(nodes: &[TreeNode], mut index: usize) -> PathGeometric {
        let mut path = PathGeometric::new();
        loop {
            path.append(nodes[index].state.clone());
            match nodes[index].parent {
                Some(parent) => index = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }
}

impl Planner for RrtPlanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_params(&mut self, params: &HashMap<String, String>) {
        for (key, value) in params {
            match key.as_str() {
                "range" => match value.parse() {
                    Ok(v) => self.range = v,
                    Err(_) => warn!("{}: bad value for range: '{}'", self.name, value),
                },
                "goal_bias" => match value.parse() {
                    Ok(v) => self.goal_bias = v,
                    Err(_) => warn!("{}: bad value for goal_bias: '{}'", self.name, value),
                },
                _ => warn!("{}: ignoring unknown parameter '{}'", self.name, key),
            }
        }
    }

    fn solve(
        &mut self,
        si: &Arc<SpaceInformation>,
        pdef: &Arc<ProblemDefinition>,
        ptc: &TerminationCondition,
    ) -> PlannerStatus {
        let goal = match pdef.goal() {
            Some(goal) => goal,
            None => return PlannerStatus::UnrecognizedGoalType,
        };

        let mut nodes: Vec<TreeNode> = pdef
            .start_states()
            .into_iter()
            .filter(|s| si.is_valid(s))
            .map(|state| TreeNode {
                state,
                parent: None,
            })
            .collect();
        if nodes.is_empty() {
            return PlannerStatus::InvalidStart;
        }

        let mut goal_stream = GoalSampleStream::new(Arc::clone(&goal));
        let mut goal_states: Vec<PlanningState> = Vec::new();
        match goal_stream.next(si, ptc) {
            Some(state) => goal_states.push(state),
            None => {
                return if ptc.is_satisfied() {
                    PlannerStatus::Timeout
                } else {
                    PlannerStatus::InvalidGoal
                };
            }
        }

        let range = if self.range > 0.0 {
            self.range
        } else {
            0.2 * si.space().maximum_extent()
        };
        let mut sampler = si.alloc_state_sampler();
        let mut rng = rand::rng();
        let mut target = PlanningState::zeros(si.space().dimension());
        let mut best: (f64, usize) = (f64::INFINITY, 0);

        while !ptc.is_satisfied() {
            if rng.random::<f64>() < self.goal_bias {
                if let GoalSample::Ready(state) = goal_stream.try_next(si) {
                    goal_states.push(state);
                }
                target = goal_states[rng.random_range(0..goal_states.len())].clone();
            } else {
                sampler.sample_uniform(&mut target);
            }

            let nearest = (0..nodes.len())
                .min_by(|&a, &b| {
                    si.distance(&nodes[a].state, &target)
                        .partial_cmp(&si.distance(&nodes[b].state, &target))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap();

            let distance = si.distance(&nodes[nearest].state, &target);
            let mut new_state = PlanningState::zeros(si.space().dimension());
            if distance > range {
                si.space()
                    .interpolate(&nodes[nearest].state, &target, range / distance, &mut new_state);
            } else {
                new_state = target.clone();
            }

            if !si.check_motion(&nodes[nearest].state, &new_state) {
                continue;
            }

            nodes.push(TreeNode {
                state: new_state,
                parent: Some(nearest),
            });
            let added = nodes.len() - 1;

            if goal.is_satisfied(&nodes[added].state) {
                let path = Self::extract_path(&nodes, added);
                debug!("{}: found exact solution with {} states", self.name, path.state_count());
                pdef.add_solution(Solution {
                    path,
                    approximate: false,
                    planner: self.name.clone(),
                });
                return PlannerStatus::ExactSolution;
            }

            let goal_distance = goal_states
                .iter()
                .map(|g| si.distance(&nodes[added].state, g))
                .fold(f64::INFINITY, f64::min);
            if goal_distance < best.0 {
                best = (goal_distance, added);
            }
        }

        if best.0.is_finite() {
            let path = Self::extract_path(&nodes, best.1);
            debug!(
                "{}: timed out, reporting approximate solution {} away from the goal",
                self.name, best.0
            );
            pdef.add_solution(Solution {
                path,
                approximate: true,
                planner: self.name.clone(),
            });
        }
        PlannerStatus::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::GoalRegion;
    use crate::model::{Joint, JointGroup, Link, RobotModel};
    use crate::space::ModelStateSpace;
    use std::time::Duration;

    struct BoxGoal {
        center: Vec<f64>,
        half: f64,
    }

    impl GoalRegion for BoxGoal {
        fn is_satisfied(&self, state: &PlanningState) -> bool {
            state
                .values
                .iter()
                .zip(self.center.iter())
                .all(|(v, c)| (v - c).abs() <= self.half)
        }

        fn sample_goal(&self, index: usize) -> GoalSample {
            if index == 0 {
                GoalSample::Ready(PlanningState {
                    values: self.center.clone(),
                })
            } else {
                GoalSample::Exhausted
            }
        }

        fn available_samples(&self) -> usize {
            1
        }
    }

    fn unit_square_si() -> Arc<SpaceInformation> {
        let joints = vec![
            Joint::prismatic("x", [1.0, 0.0], (0.0, 1.0)),
            Joint::prismatic("y", [0.0, 1.0], (0.0, 1.0)).with_parent(0),
        ];
        let links = vec![Link::new("tip", 1, [0.0, 0.0])];
        let groups = vec![JointGroup::new("base", vec![0, 1])];
        let model = RobotModel::new("point", joints, links, groups);
        let space = ModelStateSpace::new(model, "base").unwrap();
        SpaceInformation::new(space, 0.01)
    }

    struct AlwaysValid;

    impl super::super::StateValidityChecker for AlwaysValid {
        fn is_valid(&self, _state: &PlanningState) -> bool {
            true
        }
    }

    #[test]
    fn test_rrt_solves_free_square() {
        let si = unit_square_si();
        si.set_state_validity_checker(Some(Arc::new(AlwaysValid)));

        let pdef = ProblemDefinition::new();
        pdef.set_start_state(PlanningState {
            values: vec![0.0, 0.0],
        });
        pdef.set_goal(Some(Arc::new(BoxGoal {
            center: vec![0.9, 0.9],
            half: 0.1,
        })));

        let ptc = TerminationCondition::with_timeout(Duration::from_secs(5));
        let mut planner = RrtPlanner::new("RRT");
        let status = planner.solve(&si, &pdef, &ptc);
        assert_eq!(status, PlannerStatus::ExactSolution);

        let path = pdef.solution_path().unwrap();
        assert!(path.state_count() >= 2);
        assert_eq!(path.states()[0].values, vec![0.0, 0.0]);
        let last = path.states().last().unwrap();
        assert!((last.values[0] - 0.9).abs() <= 0.1);
        assert!((last.values[1] - 0.9).abs() <= 0.1);
    }

    #[test]
    fn test_rrt_no_start() {
        let si = unit_square_si();
        si.set_state_validity_checker(Some(Arc::new(AlwaysValid)));
        let pdef = ProblemDefinition::new();
        pdef.set_goal(Some(Arc::new(BoxGoal {
            center: vec![0.5, 0.5],
            half: 0.1,
        })));
        let ptc = TerminationCondition::with_timeout(Duration::from_millis(100));
        let mut planner = RrtPlanner::new("RRT");
        assert_eq!(planner.solve(&si, &pdef, &ptc), PlannerStatus::InvalidStart);
    }

    #[test]
    fn test_rrt_no_goal() {
        let si = unit_square_si();
        si.set_state_validity_checker(Some(Arc::new(AlwaysValid)));
        let pdef = ProblemDefinition::new();
        pdef.set_start_state(PlanningState {
            values: vec![0.0, 0.0],
        });
        let ptc = TerminationCondition::with_timeout(Duration::from_millis(100));
        let mut planner = RrtPlanner::new("RRT");
        assert_eq!(
            planner.solve(&si, &pdef, &ptc),
            PlannerStatus::UnrecognizedGoalType
        );
    }

    #[test]
    fn test_rrt_params() {
        let mut planner = RrtPlanner::new("RRT");
        let mut params = HashMap::new();
        params.insert("range".to_string(), "0.5".to_string());
        params.insert("goal_bias".to_string(), "0.2".to_string());
        params.insert("mystery".to_string(), "1".to_string());
        planner.set_params(&params);
        assert_eq!(planner.range, 0.5);
        assert_eq!(planner.goal_bias, 0.2);
    }
}
