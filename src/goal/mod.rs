//! Goal representations: constrained goal sampling with a lazy
//! background producer, and the union region that merges several goal
//! samplers into one sampleable region.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};
use parking_lot::Mutex;

use crate::constraints::{ConstraintSampler, ConstraintSet};
use crate::engine::{SpaceInformation, TerminationCondition};
use crate::model::RobotState;
use crate::space::{ModelStateSpace, PlanningState, StateSampler, UniformStateSampler};

/// One draw from a goal region's sample stream.
#[derive(Clone, Debug)]
pub enum GoalSample {
    /// The sample at the requested index.
    Ready(PlanningState),
    /// Not available yet; the producer may still deliver it.
    Pending,
    /// Will never be produced.
    Exhausted,
}

/// A sampleable goal region.
pub trait GoalRegion: Send + Sync {
    /// Whether a state lies inside the goal region.
    fn is_satisfied(&self, state: &PlanningState) -> bool;

    /// Retrieve the sample at `index` from the region's stream.
    /// Indices below `available_samples()` are always `Ready`.
    fn sample_goal(&self, index: usize) -> GoalSample;

    /// Number of samples currently available.
    fn available_samples(&self) -> usize;

    /// Whether the region produces samples from a background thread.
    fn has_lazy_samples(&self) -> bool {
        false
    }

    /// Start the background producer, when there is one.
    fn start_sampling(&self) {}

    /// Stop the background producer, when there is one.
    fn stop_sampling(&self) {}
}

/// Goal region defined by a constraint set, producing samples from a
/// constraint sampler on a background thread while planning runs.
pub struct ConstrainedGoalSampler {
    space: Arc<ModelStateSpace>,
    si: Arc<SpaceInformation>,
    constraint_set: Arc<ConstraintSet>,
    sampler: Arc<dyn ConstraintSampler>,
    reference: RobotState,
    states: Arc<Mutex<Vec<PlanningState>>>,
    sampling: Arc<AtomicBool>,
    exhausted: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    max_goal_samples: usize,
    max_sampling_attempts: u32,
}

impl ConstrainedGoalSampler {
    pub fn new(
        space: Arc<ModelStateSpace>,
        si: Arc<SpaceInformation>,
        constraint_set: Arc<ConstraintSet>,
        sampler: Arc<dyn ConstraintSampler>,
        reference: RobotState,
        max_goal_samples: usize,
        max_sampling_attempts: u32,
    ) -> Self {
        Self {
            space,
            si,
            constraint_set,
            sampler,
            reference,
            states: Arc::new(Mutex::new(Vec::new())),
            sampling: Arc::new(AtomicBool::new(false)),
            exhausted: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            max_goal_samples,
            max_sampling_attempts,
        }
    }
}

impl GoalRegion for ConstrainedGoalSampler {
    fn is_satisfied(&self, state: &PlanningState) -> bool {
        let mut work = self.reference.clone();
        self.space.copy_to_robot_state(&mut work, state);
        self.constraint_set.decide(&work)
    }

    fn sample_goal(&self, index: usize) -> GoalSample {
        {
            let states = self.states.lock();
            if index < states.len() {
                return GoalSample::Ready(states[index].clone());
            }
        }
        if self.exhausted.load(Ordering::Acquire) {
            GoalSample::Exhausted
        } else if self.sampling.load(Ordering::Acquire) {
            GoalSample::Pending
        } else {
            GoalSample::Exhausted
        }
    }

    fn available_samples(&self) -> usize {
        self.states.lock().len()
    }

    fn has_lazy_samples(&self) -> bool {
        true
    }

    fn start_sampling(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        self.sampling.store(true, Ordering::Release);
        self.exhausted.store(false, Ordering::Release);

        let space = Arc::clone(&self.space);
        let si = Arc::clone(&self.si);
        let constraint_set = Arc::clone(&self.constraint_set);
        let sampler = Arc::clone(&self.sampler);
        let reference = self.reference.clone();
        let states = Arc::clone(&self.states);
        let sampling = Arc::clone(&self.sampling);
        let exhausted = Arc::clone(&self.exhausted);
        let max_goal_samples = self.max_goal_samples;
        let max_sampling_attempts = self.max_sampling_attempts;

        let spawned = thread::Builder::new()
            .name("goal-sampler".into())
            .spawn(move || {
                let mut uniform = UniformStateSampler::new(Arc::clone(&space));
                let mut draw = PlanningState::zeros(space.dimension());
                let mut failures = 0u32;
                while sampling.load(Ordering::Acquire) {
                    if states.lock().len() >= max_goal_samples {
                        exhausted.store(true, Ordering::Release);
                        break;
                    }
                    let mut work = reference.clone();
                    let mut produced = None;
                    if sampler.sample(&mut work, &reference, 4) && constraint_set.decide(&work) {
                        let state = space.copy_to_planning_state(&work);
                        if space.satisfies_bounds(&state) && si.is_valid(&state) {
                            produced = Some(state);
                        }
                    }
                    if produced.is_none() {
                        // Uniform fallback, kept only when the draw lands
                        // inside the constrained region.
                        uniform.sample_uniform(&mut draw);
                        let mut robot = reference.clone();
                        space.copy_to_robot_state(&mut robot, &draw);
                        if constraint_set.decide(&robot) && si.is_valid(&draw) {
                            produced = Some(draw.clone());
                        }
                    }
                    match produced {
                        Some(state) => {
                            failures = 0;
                            states.lock().push(state);
                        }
                        None => {
                            failures += 1;
                            if failures >= max_sampling_attempts {
                                debug!(
                                    "goal sampling stopped after {} consecutive failed attempts",
                                    failures
                                );
                                exhausted.store(true, Ordering::Release);
                                break;
                            }
                        }
                    }
                }
            });

        match spawned {
            Ok(h) => *handle = Some(h),
            Err(e) => {
                error!("failed to spawn goal sampling thread: {}", e);
                self.sampling.store(false, Ordering::Release);
                self.exhausted.store(true, Ordering::Release);
            }
        }
    }

    fn stop_sampling(&self) {
        self.sampling.store(false, Ordering::Release);
        if let Some(h) = self.handle.lock().take() {
            if h.join().is_err() {
                // Non-fatal: the buffer stays usable.
                error!("goal sampling thread panicked");
            }
        }
    }
}

impl Drop for ConstrainedGoalSampler {
    fn drop(&mut self) {
        self.stop_sampling();
    }
}

/// Union of several goal regions presented as a single sampleable
/// region. Samples are distributed across members round-robin with
/// equal weighting.
pub struct GoalRegionMux {
    members: Vec<Arc<dyn GoalRegion>>,
}

impl GoalRegionMux {
    pub fn new(members: Vec<Arc<dyn GoalRegion>>) -> Self {
        Self { members }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl GoalRegion for GoalRegionMux {
    fn is_satisfied(&self, state: &PlanningState) -> bool {
        self.members.iter().any(|m| m.is_satisfied(state))
    }

    fn sample_goal(&self, index: usize) -> GoalSample {
        let counts: Vec<usize> = self.members.iter().map(|m| m.available_samples()).collect();
        let total: usize = counts.iter().sum();

        if index < total {
            // The index-th sample in round-robin order over member buffers.
            let mut position = 0;
            let max_rounds = counts.iter().copied().max().unwrap_or(0);
            for round in 0..max_rounds {
                for (m, &count) in self.members.iter().zip(counts.iter()) {
                    if round < count {
                        if position == index {
                            return m.sample_goal(round);
                        }
                        position += 1;
                    }
                }
            }
        }

        let any_pending = self
            .members
            .iter()
            .any(|m| matches!(m.sample_goal(m.available_samples()), GoalSample::Pending));
        if any_pending {
            GoalSample::Pending
        } else {
            GoalSample::Exhausted
        }
    }

    fn available_samples(&self) -> usize {
        self.members.iter().map(|m| m.available_samples()).sum()
    }

    fn has_lazy_samples(&self) -> bool {
        self.members.iter().any(|m| m.has_lazy_samples())
    }

    fn start_sampling(&self) {
        for m in &self.members {
            m.start_sampling();
        }
    }

    fn stop_sampling(&self) {
        for m in &self.members {
            m.stop_sampling();
        }
    }
}

/// Ordered consumer over a goal region's sample stream, skipping
/// states the space information rejects.
pub struct GoalSampleStream {
    goal: Arc<dyn GoalRegion>,
    next_index: usize,
}

impl GoalSampleStream {
    pub fn new(goal: Arc<dyn GoalRegion>) -> Self {
        Self {
            goal,
            next_index: 0,
        }
    }

    /// Next valid goal state, waiting on the producer until the
    /// termination condition fires or the region is exhausted.
    pub fn next(
        &mut self,
        si: &SpaceInformation,
        ptc: &TerminationCondition,
    ) -> Option<PlanningState> {
        loop {
            match self.try_next(si) {
                GoalSample::Ready(state) => return Some(state),
                GoalSample::Exhausted => return None,
                GoalSample::Pending => {
                    if ptc.is_satisfied() {
                        return None;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    /// Non-blocking pull: `Ready` with the next valid state, `Pending`
    /// while the producer may still deliver, `Exhausted` otherwise.
    pub fn try_next(&mut self, si: &SpaceInformation) -> GoalSample {
        loop {
            match self.goal.sample_goal(self.next_index) {
                GoalSample::Ready(state) => {
                    self.next_index += 1;
                    if si.is_valid(&state) {
                        return GoalSample::Ready(state);
                    }
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGoal {
        states: Vec<PlanningState>,
    }

    impl GoalRegion for FixedGoal {
        fn is_satisfied(&self, state: &PlanningState) -> bool {
            self.states.iter().any(|s| s == state)
        }

        fn sample_goal(&self, index: usize) -> GoalSample {
            match self.states.get(index) {
                Some(s) => GoalSample::Ready(s.clone()),
                None => GoalSample::Exhausted,
            }
        }

        fn available_samples(&self) -> usize {
            self.states.len()
        }
    }

    fn ps(x: f64) -> PlanningState {
        PlanningState { values: vec![x] }
    }

    #[test]
    fn test_mux_round_robin_distribution() {
        let a = Arc::new(FixedGoal {
            states: vec![ps(1.0), ps(2.0)],
        });
        let b = Arc::new(FixedGoal {
            states: vec![ps(10.0)],
        });
        let mux = GoalRegionMux::new(vec![a, b]);

        assert_eq!(mux.available_samples(), 3);
        let order: Vec<f64> = (0..3)
            .map(|i| match mux.sample_goal(i) {
                GoalSample::Ready(s) => s.values[0],
                _ => panic!("expected sample"),
            })
            .collect();
        // Round-robin: a[0], b[0], a[1].
        assert_eq!(order, vec![1.0, 10.0, 2.0]);
        assert!(matches!(mux.sample_goal(3), GoalSample::Exhausted));
    }

    #[test]
    fn test_mux_satisfied_by_any_member() {
        let a = Arc::new(FixedGoal {
            states: vec![ps(1.0)],
        });
        let b = Arc::new(FixedGoal {
            states: vec![ps(10.0)],
        });
        let mux = GoalRegionMux::new(vec![a, b]);
        assert!(mux.is_satisfied(&ps(10.0)));
        assert!(mux.is_satisfied(&ps(1.0)));
        assert!(!mux.is_satisfied(&ps(5.0)));
    }
}
