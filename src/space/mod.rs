//! Planning state space over a robot model's joint group.
//!
//! `ModelStateSpace` is the bidirectional adapter between full robot
//! configurations and the abstract states the planners operate on. It
//! owns the per-variable bounds (including the planning volume applied
//! to planar/floating joints), the default uniform sampler, the
//! sampler-allocator hook the context installs, and the registered
//! default projection.

pub mod projection;
pub mod sampler;

pub use projection::{resolve_projection, ProjectionEvaluator};
pub use sampler::{ConstrainedSampler, StateSampler, UniformStateSampler};

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::error::{PlanError, Result};
use crate::model::{JointKind, RobotModel, RobotState};

/// An abstract state: the planning group's variable values.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanningState {
    pub values: Vec<f64>,
}

impl PlanningState {
    pub fn zeros(dimension: usize) -> Self {
        Self {
            values: vec![0.0; dimension],
        }
    }
}

/// Allocator hook consulted whenever a new state sampler is required.
///
/// Returning `None` falls through to the space's default uniform
/// sampler. The decision is re-evaluated on every allocation.
pub type StateSamplerAllocator =
    Arc<dyn Fn(&Arc<ModelStateSpace>) -> Option<Box<dyn StateSampler>> + Send + Sync>;

/// State space bound to one joint group of a robot model.
pub struct ModelStateSpace {
    model: Arc<RobotModel>,
    group_name: String,
    group_joints: Vec<usize>,
    /// Model variable index backing each space variable.
    var_indices: Vec<usize>,
    bounds: RwLock<Vec<(f64, f64)>>,
    sampler_allocator: RwLock<Option<StateSamplerAllocator>>,
    projection: RwLock<Option<Arc<dyn ProjectionEvaluator>>>,
}

impl ModelStateSpace {
    pub fn new(model: Arc<RobotModel>, group: &str) -> Result<Arc<Self>> {
        let g = model
            .group(group)
            .ok_or_else(|| PlanError::Config(format!("unknown joint group '{}'", group)))?;
        let group_joints = g.joints.clone();
        let var_indices = model.group_variable_indices(g);

        let mut bounds = Vec::with_capacity(var_indices.len());
        for &j in &group_joints {
            bounds.extend(model.joint(j).bounds.iter().copied());
        }

        Ok(Arc::new(Self {
            model,
            group_name: group.to_string(),
            group_joints,
            var_indices,
            bounds: RwLock::new(bounds),
            sampler_allocator: RwLock::new(None),
            projection: RwLock::new(None),
        }))
    }

    pub fn model(&self) -> &Arc<RobotModel> {
        &self.model
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn group_joints(&self) -> &[usize] {
        &self.group_joints
    }

    /// Number of variables in the space.
    pub fn dimension(&self) -> usize {
        self.var_indices.len()
    }

    /// Position of a joint's first variable within a planning state,
    /// or `None` when the joint is not part of the group.
    pub fn group_local_offset(&self, joint: usize) -> Option<usize> {
        let mut offset = 0;
        for &j in &self.group_joints {
            if j == joint {
                return Some(offset);
            }
            offset += self.model.joint(j).kind.dof();
        }
        None
    }

    /// Extract the group variables from a full robot configuration.
    pub fn copy_to_planning_state(&self, src: &RobotState) -> PlanningState {
        PlanningState {
            values: self.var_indices.iter().map(|&i| src.values[i]).collect(),
        }
    }

    /// Write a planning state's variables into a full configuration.
    pub fn copy_to_robot_state(&self, dst: &mut RobotState, state: &PlanningState) {
        for (&i, &v) in self.var_indices.iter().zip(state.values.iter()) {
            dst.values[i] = v;
        }
    }

    /// Stable encoding of the space layout: dimension, joint count and
    /// each joint's kind/dof. Identical configuration sequences produce
    /// identical signatures.
    pub fn signature(&self) -> Vec<u8> {
        let mut sig = Vec::with_capacity(8 + 2 * self.group_joints.len());
        sig.extend((self.dimension() as u32).to_le_bytes());
        sig.extend((self.group_joints.len() as u32).to_le_bytes());
        for &j in &self.group_joints {
            let kind = self.model.joint(j).kind;
            sig.push(kind.code());
            sig.push(kind.dof() as u8);
        }
        sig
    }

    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.bounds.read().clone()
    }

    pub fn satisfies_bounds(&self, state: &PlanningState) -> bool {
        let bounds = self.bounds.read();
        state
            .values
            .iter()
            .zip(bounds.iter())
            .all(|(v, &(lo, hi))| *v >= lo - 1e-9 && *v <= hi + 1e-9)
    }

    pub fn enforce_bounds(&self, state: &mut PlanningState) {
        let bounds = self.bounds.read();
        for (v, &(lo, hi)) in state.values.iter_mut().zip(bounds.iter()) {
            *v = v.clamp(lo, hi);
        }
    }

    /// Restrict the translation bounds of planar and floating joints.
    /// Joints of other kinds are unaffected.
    pub fn set_planning_volume(
        &self,
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
        min_z: f64,
        max_z: f64,
    ) {
        if min_x == max_x && min_x == 0.0 && min_y == max_y && min_y == 0.0 && min_z == max_z && min_z == 0.0
        {
            warn!("it looks like the planning volume was not specified");
        }
        debug!(
            "{}: setting planning volume (affects planar & floating joints only) to x = [{}, {}], y = [{}, {}], z = [{}, {}]",
            self.group_name, min_x, max_x, min_y, max_y, min_z, max_z
        );

        let mut bounds = self.bounds.write();
        let mut offset = 0;
        for &j in &self.group_joints {
            let kind = self.model.joint(j).kind;
            match kind {
                JointKind::Planar => {
                    bounds[offset] = (min_x, max_x);
                    bounds[offset + 1] = (min_y, max_y);
                }
                JointKind::Floating => {
                    bounds[offset] = (min_x, max_x);
                    bounds[offset + 1] = (min_y, max_y);
                    bounds[offset + 2] = (min_z, max_z);
                }
                _ => {}
            }
            offset += kind.dof();
        }
    }

    pub fn register_default_projection(&self, projection: Arc<dyn ProjectionEvaluator>) {
        *self.projection.write() = Some(projection);
    }

    pub fn default_projection(&self) -> Option<Arc<dyn ProjectionEvaluator>> {
        self.projection.read().clone()
    }

    pub fn set_state_sampler_allocator(&self, allocator: Option<StateSamplerAllocator>) {
        *self.sampler_allocator.write() = allocator;
    }

    /// Allocate a state sampler, consulting the installed allocator
    /// first and falling back to the default uniform sampler.
    pub fn alloc_state_sampler(self: &Arc<Self>) -> Box<dyn StateSampler> {
        let allocator = self.sampler_allocator.read().clone();
        if let Some(allocator) = allocator {
            if let Some(sampler) = allocator(self) {
                return sampler;
            }
        }
        self.alloc_default_state_sampler()
    }

    /// The space-default uniform sampler over the current bounds.
    pub fn alloc_default_state_sampler(self: &Arc<Self>) -> Box<dyn StateSampler> {
        Box::new(UniformStateSampler::new(Arc::clone(self)))
    }

    /// Euclidean distance over the space variables.
    pub fn distance(&self, a: &PlanningState, b: &PlanningState) -> f64 {
        a.values
            .iter()
            .zip(b.values.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }

    /// Linear interpolation from `a` to `b` at fraction `t`.
    pub fn interpolate(&self, a: &PlanningState, b: &PlanningState, t: f64, out: &mut PlanningState) {
        out.values.clear();
        out.values
            .extend(a.values.iter().zip(b.values.iter()).map(|(x, y)| x + (y - x) * t));
    }

    /// Length of the bounds diagonal.
    pub fn maximum_extent(&self) -> f64 {
        self.bounds
            .read()
            .iter()
            .map(|&(lo, hi)| (hi - lo) * (hi - lo))
            .sum::<f64>()
            .sqrt()
    }
}

impl std::fmt::Debug for ModelStateSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStateSpace")
            .field("group", &self.group_name)
            .field("dimension", &self.dimension())
            .finish()
    }
}
