//! Scenario-building helpers: small planar models, a box-obstacle
//! scene and a rejection-sampling constraint manager.
//!
//! Used by the integration tests and demos; also a reference for
//! implementing the collaborator traits against a real robot stack.

use std::sync::Arc;

use log::info;
use rand::Rng;

use crate::constraints::{ConstraintSampler, ConstraintSamplerManager, ConstraintSet, Constraints, JointConstraint};
use crate::context::{ConfiguredPlannerAllocator, PlannerSelector};
use crate::engine::{Planner, RrtPlanner, SpaceInformation};
use crate::model::{Joint, JointGroup, Link, PlanningScene, RobotModel, RobotState};

/// Point robot with two prismatic axes (`x`, `y`) and a zero-dof `z`
/// joint, all in one group `base` carrying the link `tip`.
pub fn planar_point_model(lo: f64, hi: f64) -> Arc<RobotModel> {
    let joints = vec![
        Joint::prismatic("x", [1.0, 0.0], (lo, hi)),
        Joint::prismatic("y", [0.0, 1.0], (lo, hi)).with_parent(0),
        Joint::fixed("z").with_parent(1),
    ];
    let links = vec![Link::new("tip", 2, [0.0, 0.0])];
    let groups = vec![JointGroup::new("base", vec![0, 1, 2])];
    RobotModel::new("planar_point", joints, links, groups)
}

/// Mobile base with a single planar joint, for planning-volume tests.
pub fn planar_base_model() -> Arc<RobotModel> {
    let joints = vec![Joint::planar("base", (-10.0, 10.0), (-10.0, 10.0))];
    let links = vec![Link::new("body", 0, [0.0, 0.0])];
    let groups = vec![JointGroup::new("base", vec![0])];
    RobotModel::new("planar_base", joints, links, groups)
}

/// Axis-aligned rectangular obstacle in the XY plane.
#[derive(Clone, Copy, Debug)]
pub struct BoxObstacle {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl BoxObstacle {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }
}

/// Scene whose collision check tests every link position against a
/// set of rectangular obstacles.
pub struct BoxObstacleScene {
    name: String,
    model: Arc<RobotModel>,
    obstacles: Vec<BoxObstacle>,
}

impl BoxObstacleScene {
    pub fn new(name: &str, model: Arc<RobotModel>, obstacles: Vec<BoxObstacle>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            model,
            obstacles,
        })
    }
}

impl PlanningScene for BoxObstacleScene {
    fn name(&self) -> &str {
        &self.name
    }

    fn robot_model(&self) -> &Arc<RobotModel> {
        &self.model
    }

    fn is_state_valid(&self, state: &RobotState, verbose: bool) -> bool {
        for link in 0..self.model.links().len() {
            let p = self.model.link_translation(state, link);
            for (i, obstacle) in self.obstacles.iter().enumerate() {
                if obstacle.contains([p[0], p[1]]) {
                    if verbose {
                        info!(
                            "link '{}' at ({:.3}, {:.3}) collides with obstacle {}",
                            self.model.links()[link].name,
                            p[0],
                            p[1],
                            i
                        );
                    }
                    return false;
                }
            }
        }
        true
    }
}

/// Rejection sampler over the group's joint bounds: draw uniformly,
/// keep draws the constraint set accepts. Projection clamps the
/// variables named by joint constraints into their intervals.
struct RejectionSampler {
    group_vars: Vec<usize>,
    bounds: Vec<(f64, f64)>,
    set: ConstraintSet,
    /// (variable index, lo, hi) per joint constraint, for projection.
    clamps: Vec<(usize, f64, f64)>,
}

impl ConstraintSampler for RejectionSampler {
    fn sample(&self, state: &mut RobotState, reference: &RobotState, max_attempts: u32) -> bool {
        let mut rng = rand::rng();
        for _ in 0..max_attempts.max(1) {
            *state = reference.clone();
            for (&var, &(lo, hi)) in self.group_vars.iter().zip(self.bounds.iter()) {
                state.values[var] = if hi > lo { rng.random_range(lo..hi) } else { lo };
            }
            if self.set.decide(state) {
                return true;
            }
        }
        false
    }

    fn project(&self, state: &mut RobotState, _max_attempts: u32) -> bool {
        for &(var, lo, hi) in &self.clamps {
            state.values[var] = state.values[var].clamp(lo, hi);
        }
        self.set.decide(state)
    }
}

/// Manager selecting a rejection sampler for any non-empty constraint
/// set over known joints.
pub struct RejectionSamplerManager;

impl ConstraintSamplerManager for RejectionSamplerManager {
    fn select_sampler(
        &self,
        scene: &dyn PlanningScene,
        group: &str,
        constraints: &Constraints,
    ) -> Option<Arc<dyn ConstraintSampler>> {
        if constraints.is_empty() {
            return None;
        }
        let model = Arc::clone(scene.robot_model());
        let set = ConstraintSet::new(Arc::clone(&model), constraints);
        if set.is_empty() {
            return None;
        }

        let g = model.group(group)?;
        let group_vars = model.group_variable_indices(g);
        let mut bounds = Vec::with_capacity(group_vars.len());
        for &j in &g.joints {
            bounds.extend(model.joint(j).bounds.iter().copied());
        }

        let mut clamps = Vec::new();
        for jc in &constraints.joint_constraints {
            if let Some(j) = model.joint_index(&jc.joint_name) {
                if model.joint(j).kind.dof() > 0 {
                    clamps.push((
                        model.joint_variable_offset(j),
                        jc.position - jc.tolerance_below,
                        jc.position + jc.tolerance_above,
                    ));
                }
            }
        }

        Some(Arc::new(RejectionSampler {
            group_vars,
            bounds,
            set,
            clamps,
        }))
    }
}

/// Joint-interval constraints, one per `(joint, center, tolerance)`.
pub fn joint_box_constraints(name: &str, joints: &[(&str, f64, f64)]) -> Constraints {
    Constraints {
        name: name.to_string(),
        joint_constraints: joints
            .iter()
            .map(|&(joint, center, tolerance)| JointConstraint {
                joint_name: joint.to_string(),
                position: center,
                tolerance_above: tolerance,
                tolerance_below: tolerance,
                weight: 1.0,
            })
            .collect(),
        ..Default::default()
    }
}

/// Planner selector knowing the engine's RRT under the name `RRT`.
pub fn rrt_planner_selector() -> PlannerSelector {
    Arc::new(|planner_type: &str| -> Option<ConfiguredPlannerAllocator> {
        match planner_type {
            "RRT" => Some(Arc::new(
                |_si: Arc<SpaceInformation>, _name: &str, _spec: &crate::context::PlanningContextSpec| {
                    Box::new(RrtPlanner::new("RRT")) as Box<dyn Planner>
                },
            )),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_scene_collision() {
        let model = planar_point_model(0.0, 1.0);
        let scene = BoxObstacleScene::new(
            "boxes",
            Arc::clone(&model),
            vec![BoxObstacle::new([0.4, 0.0], [0.6, 1.0])],
        );
        let mut state = RobotState::default_for(&model);
        state.values = vec![0.5, 0.5];
        assert!(!scene.is_state_valid(&state, false));
        state.values = vec![0.1, 0.5];
        assert!(scene.is_state_valid(&state, false));
    }

    #[test]
    fn test_rejection_manager_selects_for_nonempty() {
        let model = planar_point_model(0.0, 1.0);
        let scene = BoxObstacleScene::new("empty", Arc::clone(&model), vec![]);
        let manager = RejectionSamplerManager;

        assert!(manager
            .select_sampler(scene.as_ref(), "base", &Constraints::default())
            .is_none());

        let constraints = joint_box_constraints("gate", &[("x", 0.5, 0.05)]);
        let sampler = manager
            .select_sampler(scene.as_ref(), "base", &constraints)
            .unwrap();

        let reference = RobotState::default_for(&model);
        let mut state = reference.clone();
        assert!(sampler.sample(&mut state, &reference, 100));
        assert!((state.values[0] - 0.5).abs() <= 0.05);

        state.values[0] = 0.9;
        assert!(sampler.project(&mut state, 4));
        assert!((state.values[0] - 0.55).abs() < 1e-12);
    }
}
