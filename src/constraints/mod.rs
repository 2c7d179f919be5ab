//! Kinematic constraints: the serializable message form, merge
//! semantics, and the resolved evaluator (`ConstraintSet`).

pub mod approximation;
pub mod sampler;

pub use approximation::ConstraintApproximationLibrary;
pub use sampler::{ConstraintSampler, ConstraintSamplerManager, ValidConstrainedSampler};

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::model::{RobotModel, RobotState};

/// Bound on a single joint value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointConstraint {
    pub joint_name: String,
    pub position: f64,
    pub tolerance_above: f64,
    pub tolerance_below: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Box bound on a link's world position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionConstraint {
    pub link_name: String,
    pub target: [f64; 3],
    pub tolerance: [f64; 3],
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Bound on a link's world yaw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientationConstraint {
    pub link_name: String,
    pub target_yaw: f64,
    pub tolerance: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

/// Requires a link to stay within sensing range of a fixed point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisibilityConstraint {
    pub target_link: String,
    pub sensor_position: [f64; 3],
    pub max_range: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// The message form of a constraint specification.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub joint_constraints: Vec<JointConstraint>,
    #[serde(default)]
    pub position_constraints: Vec<PositionConstraint>,
    #[serde(default)]
    pub orientation_constraints: Vec<OrientationConstraint>,
    #[serde(default)]
    pub visibility_constraints: Vec<VisibilityConstraint>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.joint_constraints.is_empty()
            && self.position_constraints.is_empty()
            && self.orientation_constraints.is_empty()
            && self.visibility_constraints.is_empty()
    }

    /// Merge `first` with `second`, intersecting joint bounds that
    /// refer to the same joint and concatenating everything else.
    ///
    /// When an intersection is empty the constraint from `first` wins
    /// and a warning is logged.
    pub fn merged(first: &Constraints, second: &Constraints) -> Constraints {
        let mut out = first.clone();

        for jc in &second.joint_constraints {
            match out
                .joint_constraints
                .iter_mut()
                .find(|c| c.joint_name == jc.joint_name)
            {
                None => out.joint_constraints.push(jc.clone()),
                Some(existing) => {
                    let lo = (existing.position - existing.tolerance_below)
                        .max(jc.position - jc.tolerance_below);
                    let hi = (existing.position + existing.tolerance_above)
                        .min(jc.position + jc.tolerance_above);
                    if lo > hi {
                        warn!(
                            "joint constraints on '{}' are incompatible, keeping the first",
                            jc.joint_name
                        );
                    } else {
                        let position = 0.5 * (lo + hi);
                        existing.tolerance_below = position - lo;
                        existing.tolerance_above = hi - position;
                        existing.position = position;
                        existing.weight = existing.weight.min(jc.weight);
                    }
                }
            }
        }

        out.position_constraints
            .extend(second.position_constraints.iter().cloned());
        out.orientation_constraints
            .extend(second.orientation_constraints.iter().cloned());
        out.visibility_constraints
            .extend(second.visibility_constraints.iter().cloned());
        out
    }
}

enum ResolvedConstraint {
    Joint { var: usize, lo: f64, hi: f64 },
    Position { link: usize, target: [f64; 3], tolerance: [f64; 3] },
    Orientation { link: usize, yaw: f64, tolerance: f64 },
    Visibility { link: usize, sensor: [f64; 3], max_range: f64 },
}

/// A constraint message resolved against a robot model, ready to
/// evaluate full configurations.
pub struct ConstraintSet {
    model: Arc<RobotModel>,
    message: Constraints,
    resolved: Vec<ResolvedConstraint>,
}

impl ConstraintSet {
    /// Resolve a message. Constraints naming unknown joints or links
    /// are skipped with a warning.
    pub fn new(model: Arc<RobotModel>, message: &Constraints) -> Self {
        let mut resolved = Vec::new();

        for jc in &message.joint_constraints {
            match model.joint_index(&jc.joint_name) {
                Some(j) if model.joint(j).kind.dof() > 0 => {
                    let var = model.joint_variable_offset(j);
                    resolved.push(ResolvedConstraint::Joint {
                        var,
                        lo: jc.position - jc.tolerance_below,
                        hi: jc.position + jc.tolerance_above,
                    });
                }
                _ => warn!("skipping constraint on unknown joint '{}'", jc.joint_name),
            }
        }
        for pc in &message.position_constraints {
            match model.link_index(&pc.link_name) {
                Some(link) => resolved.push(ResolvedConstraint::Position {
                    link,
                    target: pc.target,
                    tolerance: pc.tolerance,
                }),
                None => warn!("skipping constraint on unknown link '{}'", pc.link_name),
            }
        }
        for oc in &message.orientation_constraints {
            match model.link_index(&oc.link_name) {
                Some(link) => resolved.push(ResolvedConstraint::Orientation {
                    link,
                    yaw: oc.target_yaw,
                    tolerance: oc.tolerance,
                }),
                None => warn!("skipping constraint on unknown link '{}'", oc.link_name),
            }
        }
        for vc in &message.visibility_constraints {
            match model.link_index(&vc.target_link) {
                Some(link) => resolved.push(ResolvedConstraint::Visibility {
                    link,
                    sensor: vc.sensor_position,
                    max_range: vc.max_range,
                }),
                None => warn!("skipping constraint on unknown link '{}'", vc.target_link),
            }
        }

        Self {
            model,
            message: message.clone(),
            resolved,
        }
    }

    /// The message this set was resolved from.
    pub fn message(&self) -> &Constraints {
        &self.message
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Whether the configuration satisfies every resolved constraint.
    pub fn decide(&self, state: &RobotState) -> bool {
        self.resolved.iter().all(|c| match c {
            ResolvedConstraint::Joint { var, lo, hi } => {
                let v = state.values[*var];
                v >= *lo && v <= *hi
            }
            ResolvedConstraint::Position { link, target, tolerance } => {
                let p = self.model.link_translation(state, *link);
                (0..3).all(|i| (p[i] - target[i]).abs() <= tolerance[i])
            }
            ResolvedConstraint::Orientation { link, yaw, tolerance } => {
                let actual = self.model.link_yaw(state, *link);
                angle_distance(actual, *yaw) <= *tolerance
            }
            ResolvedConstraint::Visibility { link, sensor, max_range } => {
                let p = self.model.link_translation(state, *link);
                let d2: f64 = (0..3).map(|i| (p[i] - sensor[i]) * (p[i] - sensor[i])).sum();
                d2.sqrt() <= *max_range
            }
        })
    }
}

fn angle_distance(a: f64, b: f64) -> f64 {
    let mut d = (a - b) % (2.0 * std::f64::consts::PI);
    if d > std::f64::consts::PI {
        d -= 2.0 * std::f64::consts::PI;
    }
    if d < -std::f64::consts::PI {
        d += 2.0 * std::f64::consts::PI;
    }
    d.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Joint, JointGroup, Link};

    fn point_model() -> Arc<RobotModel> {
        let joints = vec![
            Joint::prismatic("x", [1.0, 0.0], (-2.0, 2.0)),
            Joint::prismatic("y", [0.0, 1.0], (-2.0, 2.0)).with_parent(0),
        ];
        let links = vec![Link::new("tip", 1, [0.0, 0.0])];
        let groups = vec![JointGroup::new("base", vec![0, 1])];
        RobotModel::new("point", joints, links, groups)
    }

    fn joint_box(name: &str, position: f64, tol: f64) -> JointConstraint {
        JointConstraint {
            joint_name: name.to_string(),
            position,
            tolerance_above: tol,
            tolerance_below: tol,
            weight: 1.0,
        }
    }

    #[test]
    fn test_joint_constraint_decide() {
        let model = point_model();
        let msg = Constraints {
            joint_constraints: vec![joint_box("x", 1.0, 0.25)],
            ..Default::default()
        };
        let set = ConstraintSet::new(Arc::clone(&model), &msg);
        assert!(!set.is_empty());

        let mut state = RobotState::default_for(&model);
        state.values[0] = 1.1;
        assert!(set.decide(&state));
        state.values[0] = 1.5;
        assert!(!set.decide(&state));
    }

    #[test]
    fn test_position_constraint_decide() {
        let model = point_model();
        let msg = Constraints {
            position_constraints: vec![PositionConstraint {
                link_name: "tip".into(),
                target: [1.0, 1.0, 0.0],
                tolerance: [0.2, 0.2, 0.1],
                weight: 1.0,
            }],
            ..Default::default()
        };
        let set = ConstraintSet::new(Arc::clone(&model), &msg);

        let mut state = RobotState::default_for(&model);
        state.values = vec![1.1, 0.9];
        assert!(set.decide(&state));
        state.values = vec![0.0, 0.0];
        assert!(!set.decide(&state));
    }

    #[test]
    fn test_unknown_names_skipped() {
        let model = point_model();
        let msg = Constraints {
            joint_constraints: vec![joint_box("ghost", 0.0, 1.0)],
            position_constraints: vec![PositionConstraint {
                link_name: "nowhere".into(),
                target: [0.0; 3],
                tolerance: [1.0; 3],
                weight: 1.0,
            }],
            ..Default::default()
        };
        let set = ConstraintSet::new(model, &msg);
        assert!(set.is_empty());
    }

    #[test]
    fn test_merge_intersects_joint_bounds() {
        let goal = Constraints {
            joint_constraints: vec![joint_box("x", 1.0, 0.5)],
            ..Default::default()
        };
        let path = Constraints {
            joint_constraints: vec![joint_box("x", 1.25, 0.5)],
            ..Default::default()
        };
        let merged = Constraints::merged(&goal, &path);
        assert_eq!(merged.joint_constraints.len(), 1);
        let jc = &merged.joint_constraints[0];
        // Intersection is [0.75, 1.5].
        assert!((jc.position - jc.tolerance_below - 0.75).abs() < 1e-12);
        assert!((jc.position + jc.tolerance_above - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_merge_incompatible_keeps_first() {
        let goal = Constraints {
            joint_constraints: vec![joint_box("x", 0.0, 0.1)],
            ..Default::default()
        };
        let path = Constraints {
            joint_constraints: vec![joint_box("x", 1.0, 0.1)],
            ..Default::default()
        };
        let merged = Constraints::merged(&goal, &path);
        assert_eq!(merged.joint_constraints.len(), 1);
        assert!((merged.joint_constraints[0].position - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_concatenates_disjoint() {
        let goal = Constraints {
            joint_constraints: vec![joint_box("x", 0.0, 0.1)],
            ..Default::default()
        };
        let path = Constraints {
            joint_constraints: vec![joint_box("y", 0.0, 0.1)],
            ..Default::default()
        };
        let merged = Constraints::merged(&goal, &path);
        assert_eq!(merged.joint_constraints.len(), 2);
    }
}
