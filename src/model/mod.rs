//! Robot kinematics model: joints, links, planning groups and full
//! robot configurations.
//!
//! The model is deliberately lean. It provides what the planning layer
//! needs: a stable variable layout over all joints, joint/link/group
//! lookup by name, bounds per variable, and a planar-chain forward
//! kinematics good enough for link-pose projections and point-style
//! collision checks.

mod scene;

pub use scene::PlanningScene;

use std::sync::Arc;

/// Kind of a joint, which fixes its variable count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JointKind {
    /// No variables, rigid attachment.
    Fixed,
    /// One variable: rotation about the chain Z axis (radians).
    Revolute,
    /// One variable: translation along `axis` in the joint frame.
    Prismatic,
    /// Three variables: x, y, yaw.
    Planar,
    /// Seven variables: x, y, z and a quaternion (qx, qy, qz, qw).
    Floating,
}

impl JointKind {
    /// Number of state variables the joint contributes.
    pub fn dof(self) -> usize {
        match self {
            JointKind::Fixed => 0,
            JointKind::Revolute | JointKind::Prismatic => 1,
            JointKind::Planar => 3,
            JointKind::Floating => 7,
        }
    }

    /// Stable one-byte code used in the state-space signature.
    pub fn code(self) -> u8 {
        match self {
            JointKind::Fixed => 0,
            JointKind::Revolute => 1,
            JointKind::Prismatic => 2,
            JointKind::Planar => 3,
            JointKind::Floating => 4,
        }
    }
}

/// A single joint in the kinematic chain.
#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    pub kind: JointKind,
    /// Parent joint index; `None` for a chain root.
    pub parent: Option<usize>,
    /// Translation from the parent frame, expressed in the parent frame.
    pub origin: [f64; 2],
    /// Translation axis for prismatic joints, in the joint frame.
    pub axis: [f64; 2],
    /// Per-variable (lower, upper) bounds; length equals `kind.dof()`.
    pub bounds: Vec<(f64, f64)>,
}

impl Joint {
    pub fn fixed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: JointKind::Fixed,
            parent: None,
            origin: [0.0, 0.0],
            axis: [1.0, 0.0],
            bounds: Vec::new(),
        }
    }

    pub fn revolute(name: &str, bounds: (f64, f64)) -> Self {
        Self {
            name: name.to_string(),
            kind: JointKind::Revolute,
            parent: None,
            origin: [0.0, 0.0],
            axis: [1.0, 0.0],
            bounds: vec![bounds],
        }
    }

    pub fn prismatic(name: &str, axis: [f64; 2], bounds: (f64, f64)) -> Self {
        Self {
            name: name.to_string(),
            kind: JointKind::Prismatic,
            parent: None,
            origin: [0.0, 0.0],
            axis,
            bounds: vec![bounds],
        }
    }

    pub fn planar(name: &str, x: (f64, f64), y: (f64, f64)) -> Self {
        Self {
            name: name.to_string(),
            kind: JointKind::Planar,
            parent: None,
            origin: [0.0, 0.0],
            axis: [1.0, 0.0],
            bounds: vec![x, y, (-std::f64::consts::PI, std::f64::consts::PI)],
        }
    }

    pub fn floating(name: &str, x: (f64, f64), y: (f64, f64), z: (f64, f64)) -> Self {
        Self {
            name: name.to_string(),
            kind: JointKind::Floating,
            parent: None,
            origin: [0.0, 0.0],
            axis: [1.0, 0.0],
            bounds: vec![x, y, z, (-1.0, 1.0), (-1.0, 1.0), (-1.0, 1.0), (-1.0, 1.0)],
        }
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_origin(mut self, origin: [f64; 2]) -> Self {
        self.origin = origin;
        self
    }
}

/// A rigid body attached to a joint.
#[derive(Clone, Debug)]
pub struct Link {
    pub name: String,
    /// Index of the joint this link is attached to.
    pub joint: usize,
    /// Translation from the joint frame to the link origin.
    pub offset: [f64; 2],
}

impl Link {
    pub fn new(name: &str, joint: usize, offset: [f64; 2]) -> Self {
        Self {
            name: name.to_string(),
            joint,
            offset,
        }
    }
}

/// A named subset of joints planned for together.
#[derive(Clone, Debug)]
pub struct JointGroup {
    pub name: String,
    /// Joint indices, in planning order.
    pub joints: Vec<usize>,
}

impl JointGroup {
    pub fn new(name: &str, joints: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            joints,
        }
    }
}

/// A full robot configuration: one value per model variable.
#[derive(Clone, Debug, PartialEq)]
pub struct RobotState {
    pub values: Vec<f64>,
}

impl RobotState {
    /// Create the model's default state (all variables at the midpoint
    /// of their bounds, or zero when zero is in bounds).
    pub fn default_for(model: &RobotModel) -> Self {
        let mut values = Vec::with_capacity(model.variable_count());
        for joint in &model.joints {
            for &(lo, hi) in &joint.bounds {
                if lo <= 0.0 && 0.0 <= hi {
                    values.push(0.0);
                } else {
                    values.push(0.5 * (lo + hi));
                }
            }
        }
        Self { values }
    }
}

/// The kinematics model consumed by the planning layer.
#[derive(Debug)]
pub struct RobotModel {
    name: String,
    joints: Vec<Joint>,
    links: Vec<Link>,
    groups: Vec<JointGroup>,
    /// First variable index of each joint in the full state vector.
    var_offsets: Vec<usize>,
    variable_count: usize,
}

impl RobotModel {
    pub fn new(name: &str, joints: Vec<Joint>, links: Vec<Link>, groups: Vec<JointGroup>) -> Arc<Self> {
        let mut var_offsets = Vec::with_capacity(joints.len());
        let mut offset = 0;
        for joint in &joints {
            debug_assert_eq!(joint.bounds.len(), joint.kind.dof());
            var_offsets.push(offset);
            offset += joint.kind.dof();
        }
        Arc::new(Self {
            name: name.to_string(),
            joints,
            links,
            groups,
            var_offsets,
            variable_count: offset,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> &Joint {
        &self.joints[index]
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// First variable index of the joint in the full state vector.
    pub fn joint_variable_offset(&self, index: usize) -> usize {
        self.var_offsets[index]
    }

    pub fn has_link(&self, name: &str) -> bool {
        self.links.iter().any(|l| l.name == name)
    }

    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|l| l.name == name)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn group(&self, name: &str) -> Option<&JointGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Variable indices of a group's joints, concatenated in group order.
    pub fn group_variable_indices(&self, group: &JointGroup) -> Vec<usize> {
        let mut indices = Vec::new();
        for &j in &group.joints {
            let start = self.var_offsets[j];
            indices.extend(start..start + self.joints[j].kind.dof());
        }
        indices
    }

    /// World translation of a link under the given state.
    ///
    /// The chain is evaluated with planar rotations (revolute and planar
    /// yaw about Z); floating joints contribute their world translation.
    pub fn link_translation(&self, state: &RobotState, link_index: usize) -> [f64; 3] {
        let link = &self.links[link_index];
        let chain = self.joint_chain(link.joint);

        let (mut x, mut y, mut z, mut theta) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
        for &j in &chain {
            let joint = &self.joints[j];
            let (c, s) = (theta.cos(), theta.sin());
            x += c * joint.origin[0] - s * joint.origin[1];
            y += s * joint.origin[0] + c * joint.origin[1];

            let v = self.var_offsets[j];
            match joint.kind {
                JointKind::Fixed => {}
                JointKind::Revolute => theta += state.values[v],
                JointKind::Prismatic => {
                    let d = state.values[v];
                    let ax = c * joint.axis[0] - s * joint.axis[1];
                    let ay = s * joint.axis[0] + c * joint.axis[1];
                    x += ax * d;
                    y += ay * d;
                }
                JointKind::Planar => {
                    let (vx, vy, vt) = (state.values[v], state.values[v + 1], state.values[v + 2]);
                    x += c * vx - s * vy;
                    y += s * vx + c * vy;
                    theta += vt;
                }
                JointKind::Floating => {
                    x += state.values[v];
                    y += state.values[v + 1];
                    z += state.values[v + 2];
                }
            }
        }

        let (c, s) = (theta.cos(), theta.sin());
        [
            x + c * link.offset[0] - s * link.offset[1],
            y + s * link.offset[0] + c * link.offset[1],
            z,
        ]
    }

    /// World yaw of a link's frame under the given state.
    pub fn link_yaw(&self, state: &RobotState, link_index: usize) -> f64 {
        let link = &self.links[link_index];
        let mut theta = 0.0;
        for &j in &self.joint_chain(link.joint) {
            let joint = &self.joints[j];
            let v = self.var_offsets[j];
            match joint.kind {
                JointKind::Revolute => theta += state.values[v],
                JointKind::Planar => theta += state.values[v + 2],
                _ => {}
            }
        }
        theta
    }

    fn joint_chain(&self, joint: usize) -> Vec<usize> {
        let mut chain = vec![joint];
        let mut current = joint;
        while let Some(parent) = self.joints[current].parent {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_axis_model() -> Arc<RobotModel> {
        let joints = vec![
            Joint::prismatic("x", [1.0, 0.0], (-1.0, 1.0)),
            Joint::prismatic("y", [0.0, 1.0], (-1.0, 1.0)).with_parent(0),
            Joint::fixed("z").with_parent(1),
        ];
        let links = vec![Link::new("tip", 2, [0.0, 0.0])];
        let groups = vec![JointGroup::new("base", vec![0, 1, 2])];
        RobotModel::new("cartesian", joints, links, groups)
    }

    #[test]
    fn test_variable_layout() {
        let model = two_axis_model();
        assert_eq!(model.variable_count(), 2);
        assert_eq!(model.joint_variable_offset(0), 0);
        assert_eq!(model.joint_variable_offset(1), 1);
        assert_eq!(model.joint_variable_offset(2), 2);
    }

    #[test]
    fn test_group_variable_indices() {
        let model = two_axis_model();
        let group = model.group("base").unwrap();
        assert_eq!(model.group_variable_indices(group), vec![0, 1]);
    }

    #[test]
    fn test_link_translation_prismatic() {
        let model = two_axis_model();
        let mut state = RobotState::default_for(&model);
        state.values[0] = 0.3;
        state.values[1] = -0.2;
        let p = model.link_translation(&state, 0);
        assert!((p[0] - 0.3).abs() < 1e-12);
        assert!((p[1] + 0.2).abs() < 1e-12);
        assert_eq!(p[2], 0.0);
    }

    #[test]
    fn test_link_translation_revolute_arm() {
        // Two-link arm: shoulder at origin, elbow 1m out, tip 1m further.
        let joints = vec![
            Joint::revolute("shoulder", (-3.2, 3.2)),
            Joint::revolute("elbow", (-3.2, 3.2))
                .with_parent(0)
                .with_origin([1.0, 0.0]),
        ];
        let links = vec![Link::new("tip", 1, [1.0, 0.0])];
        let groups = vec![JointGroup::new("arm", vec![0, 1])];
        let model = RobotModel::new("arm", joints, links, groups);

        let mut state = RobotState::default_for(&model);
        state.values[0] = std::f64::consts::FRAC_PI_2;
        state.values[1] = -std::f64::consts::FRAC_PI_2;
        let p = model.link_translation(&state, 0);
        assert!((p[0] - 1.0).abs() < 1e-9);
        assert!((p[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_state_in_bounds() {
        let joints = vec![Joint::prismatic("lift", [1.0, 0.0], (0.2, 0.8))];
        let model = RobotModel::new("lift", joints, vec![], vec![]);
        let state = RobotState::default_for(&model);
        assert!((state.values[0] - 0.5).abs() < 1e-12);
    }
}
