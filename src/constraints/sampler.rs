//! Constraint sampler contracts and the valid-constrained adapter used
//! by the sequential follower.

use std::sync::Arc;

use crate::model::{PlanningScene, RobotState};
use crate::space::{ModelStateSpace, PlanningState};

use super::{ConstraintSet, Constraints};

/// A sampler restricted to configurations satisfying one constraint set.
///
/// Implementations work in full-configuration space; strategy internals
/// (IK seeding, approximation databases, rejection) are up to the
/// implementor.
pub trait ConstraintSampler: Send + Sync {
    /// Draw a configuration satisfying the constraints, using
    /// `reference` for unset variables. Returns false when no
    /// satisfying draw was produced within `max_attempts`.
    fn sample(&self, state: &mut RobotState, reference: &RobotState, max_attempts: u32) -> bool;

    /// Snap an existing configuration into the constrained region.
    fn project(&self, state: &mut RobotState, max_attempts: u32) -> bool;
}

/// Selects a constraint sampler for a scene, group and constraint set.
pub trait ConstraintSamplerManager: Send + Sync {
    fn select_sampler(
        &self,
        scene: &dyn PlanningScene,
        group: &str,
        constraints: &Constraints,
    ) -> Option<Arc<dyn ConstraintSampler>>;
}

/// Constraint sampler bound to a state space: produces planning states
/// inside one constrained region, for use as a follower chain element.
pub struct ValidConstrainedSampler {
    space: Arc<ModelStateSpace>,
    sampler: Arc<dyn ConstraintSampler>,
    constraint_set: Arc<ConstraintSet>,
    reference: RobotState,
    max_attempts: u32,
}

impl ValidConstrainedSampler {
    pub fn new(
        space: Arc<ModelStateSpace>,
        sampler: Arc<dyn ConstraintSampler>,
        constraint_set: Arc<ConstraintSet>,
        reference: RobotState,
        max_attempts: u32,
    ) -> Self {
        Self {
            space,
            sampler,
            constraint_set,
            reference,
            max_attempts,
        }
    }

    /// Draw a fresh state inside the constrained region.
    pub fn sample(&self, out: &mut PlanningState) -> bool {
        let mut work = self.reference.clone();
        if !self.sampler.sample(&mut work, &self.reference, self.max_attempts) {
            return false;
        }
        if !self.constraint_set.decide(&work) {
            return false;
        }
        *out = self.space.copy_to_planning_state(&work);
        self.space.satisfies_bounds(out)
    }

    /// Snap `out` into the constrained region in place.
    pub fn project(&self, out: &mut PlanningState) -> bool {
        let mut work = self.reference.clone();
        self.space.copy_to_robot_state(&mut work, out);
        if !self.sampler.project(&mut work, self.max_attempts) {
            return false;
        }
        if !self.constraint_set.decide(&work) {
            return false;
        }
        *out = self.space.copy_to_planning_state(&work);
        self.space.satisfies_bounds(out)
    }

    /// Whether a full configuration satisfies this region's constraints.
    pub fn satisfies(&self, state: &PlanningState) -> bool {
        let mut work = self.reference.clone();
        self.space.copy_to_robot_state(&mut work, state);
        self.constraint_set.decide(&work)
    }
}
