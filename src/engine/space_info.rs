//! Space information: validity checking and local motion validation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::warn;
use parking_lot::RwLock;

use crate::space::{ModelStateSpace, PlanningState, StateSampler};

/// Boolean predicate on planning states.
pub trait StateValidityChecker: Send + Sync {
    fn is_valid(&self, state: &PlanningState) -> bool;
}

/// Bundles the state space with its validity checker and the discrete
/// local-motion validator, and counts motion-check outcomes.
pub struct SpaceInformation {
    space: Arc<ModelStateSpace>,
    checker: RwLock<Option<Arc<dyn StateValidityChecker>>>,
    /// Motion checks are sampled at this fraction of the space extent.
    longest_valid_segment_fraction: f64,
    valid_motions: AtomicUsize,
    invalid_motions: AtomicUsize,
}

impl SpaceInformation {
    pub fn new(space: Arc<ModelStateSpace>, longest_valid_segment_fraction: f64) -> Arc<Self> {
        Arc::new(Self {
            space,
            checker: RwLock::new(None),
            longest_valid_segment_fraction,
            valid_motions: AtomicUsize::new(0),
            invalid_motions: AtomicUsize::new(0),
        })
    }

    pub fn space(&self) -> &Arc<ModelStateSpace> {
        &self.space
    }

    pub fn set_state_validity_checker(&self, checker: Option<Arc<dyn StateValidityChecker>>) {
        *self.checker.write() = checker;
    }

    pub fn has_state_validity_checker(&self) -> bool {
        self.checker.read().is_some()
    }

    /// Whether the state is within bounds and valid per the checker.
    ///
    /// Without an installed checker every in-bounds state is valid and
    /// a warning is logged.
    pub fn is_valid(&self, state: &PlanningState) -> bool {
        if !self.space.satisfies_bounds(state) {
            return false;
        }
        match self.checker.read().as_ref() {
            Some(checker) => checker.is_valid(state),
            None => {
                warn!("no state validity checker installed, assuming valid");
                true
            }
        }
    }

    /// Local motion validation: the straight segment from `a` to `b`,
    /// sampled at the configured resolution, is collision free.
    pub fn check_motion(&self, a: &PlanningState, b: &PlanningState) -> bool {
        let valid = self.check_motion_inner(a, b);
        if valid {
            self.valid_motions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.invalid_motions.fetch_add(1, Ordering::Relaxed);
        }
        valid
    }

    fn check_motion_inner(&self, a: &PlanningState, b: &PlanningState) -> bool {
        if !self.is_valid(b) {
            return false;
        }
        let resolution = self.longest_valid_segment_fraction * self.space.maximum_extent();
        let distance = self.space.distance(a, b);
        if distance <= resolution {
            return true;
        }
        let segments = (distance / resolution).ceil() as usize;
        let mut work = PlanningState::zeros(self.space.dimension());
        for k in 1..segments {
            let t = k as f64 / segments as f64;
            self.space.interpolate(a, b, t, &mut work);
            if !self.is_valid(&work) {
                return false;
            }
        }
        true
    }

    /// (valid, invalid) motion-check counts since the last reset.
    pub fn motion_counts(&self) -> (usize, usize) {
        (
            self.valid_motions.load(Ordering::Relaxed),
            self.invalid_motions.load(Ordering::Relaxed),
        )
    }

    pub fn reset_motion_counter(&self) {
        self.valid_motions.store(0, Ordering::Relaxed);
        self.invalid_motions.store(0, Ordering::Relaxed);
    }

    /// Allocate a sampler through the space's allocator hook.
    pub fn alloc_state_sampler(&self) -> Box<dyn StateSampler> {
        self.space.alloc_state_sampler()
    }

    pub fn distance(&self, a: &PlanningState, b: &PlanningState) -> f64 {
        self.space.distance(a, b)
    }
}
