//! State samplers over a model state space.

use std::sync::Arc;

use log::debug;
use rand::Rng;

use crate::constraints::ConstraintSampler;
use crate::model::RobotState;

use super::{ModelStateSpace, PlanningState};

/// Draws abstract states from the space.
pub trait StateSampler: Send {
    /// Fill `out` with a fresh sample.
    fn sample_uniform(&mut self, out: &mut PlanningState);
}

/// Uniform sampling within the space bounds.
pub struct UniformStateSampler {
    space: Arc<ModelStateSpace>,
}

impl UniformStateSampler {
    pub fn new(space: Arc<ModelStateSpace>) -> Self {
        Self { space }
    }
}

impl StateSampler for UniformStateSampler {
    fn sample_uniform(&mut self, out: &mut PlanningState) {
        let bounds = self.space.bounds();
        let mut rng = rand::rng();
        out.values.clear();
        out.values.extend(bounds.iter().map(|&(lo, hi)| {
            if hi > lo {
                rng.random_range(lo..hi)
            } else {
                lo
            }
        }));
    }
}

/// Sampler adapter around a constraint sampler selected by the manager.
///
/// Draws full robot configurations from the constraint sampler and maps
/// them into the space; when the constrained draw fails after the
/// attempt budget, falls back to the space-default uniform sampler so
/// planning can continue.
pub struct ConstrainedSampler {
    space: Arc<ModelStateSpace>,
    sampler: Arc<dyn ConstraintSampler>,
    reference: RobotState,
    fallback: UniformStateSampler,
    max_attempts: u32,
    constrained_success: usize,
    constrained_failure: usize,
}

impl ConstrainedSampler {
    pub fn new(
        space: Arc<ModelStateSpace>,
        sampler: Arc<dyn ConstraintSampler>,
        reference: RobotState,
        max_attempts: u32,
    ) -> Self {
        let fallback = UniformStateSampler::new(Arc::clone(&space));
        Self {
            space,
            sampler,
            reference,
            fallback,
            max_attempts,
            constrained_success: 0,
            constrained_failure: 0,
        }
    }

    /// Fraction of draws the constraint sampler itself satisfied.
    pub fn constrained_sample_rate(&self) -> f64 {
        let total = self.constrained_success + self.constrained_failure;
        if total == 0 {
            return 0.0;
        }
        self.constrained_success as f64 / total as f64
    }
}

impl StateSampler for ConstrainedSampler {
    fn sample_uniform(&mut self, out: &mut PlanningState) {
        let mut work = self.reference.clone();
        if self.sampler.sample(&mut work, &self.reference, self.max_attempts) {
            *out = self.space.copy_to_planning_state(&work);
            self.space.enforce_bounds(out);
            self.constrained_success += 1;
        } else {
            self.constrained_failure += 1;
            debug!(
                "{}: constrained draw failed, falling back to uniform sampling",
                self.space.group_name()
            );
            self.fallback.sample_uniform(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Joint, JointGroup, Link, RobotModel};

    fn point_space() -> Arc<ModelStateSpace> {
        let joints = vec![
            Joint::prismatic("x", [1.0, 0.0], (0.0, 1.0)),
            Joint::prismatic("y", [0.0, 1.0], (0.0, 1.0)).with_parent(0),
        ];
        let links = vec![Link::new("tip", 1, [0.0, 0.0])];
        let groups = vec![JointGroup::new("base", vec![0, 1])];
        let model = RobotModel::new("point", joints, links, groups);
        ModelStateSpace::new(model, "base").unwrap()
    }

    #[test]
    fn test_uniform_sampler_in_bounds() {
        let space = point_space();
        let mut sampler = UniformStateSampler::new(Arc::clone(&space));
        let mut state = PlanningState::zeros(2);
        for _ in 0..100 {
            sampler.sample_uniform(&mut state);
            assert!(space.satisfies_bounds(&state));
        }
    }

    struct HalfPlaneSampler;

    impl ConstraintSampler for HalfPlaneSampler {
        fn sample(&self, state: &mut RobotState, _reference: &RobotState, _attempts: u32) -> bool {
            let mut rng = rand::rng();
            state.values[0] = rng.random_range(0.5..1.0);
            state.values[1] = rng.random_range(0.0..1.0);
            true
        }

        fn project(&self, state: &mut RobotState, _attempts: u32) -> bool {
            state.values[0] = state.values[0].max(0.5);
            true
        }
    }

    #[test]
    fn test_constrained_adapter_uses_constraint_sampler() {
        let space = point_space();
        let model = Arc::clone(space.model());
        let reference = RobotState::default_for(&model);
        let mut adapter = ConstrainedSampler::new(
            Arc::clone(&space),
            Arc::new(HalfPlaneSampler),
            reference,
            4,
        );
        let mut state = PlanningState::zeros(2);
        for _ in 0..50 {
            adapter.sample_uniform(&mut state);
            assert!(state.values[0] >= 0.5);
        }
        assert!(adapter.constrained_sample_rate() > 0.99);
    }
}
