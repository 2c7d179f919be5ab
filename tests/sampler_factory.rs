//! Sampler-factory priority: precomputed approximation sampler, then
//! manager-selected constrained sampler, then the uniform default.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use marga_plan::constraints::{
    ConstraintApproximationLibrary, ConstraintSampler, ConstraintSamplerManager, Constraints,
};
use marga_plan::context::{ContextSettings, PlanningContext, PlanningContextSpec};
use marga_plan::harness::{
    joint_box_constraints, planar_point_model, rrt_planner_selector, BoxObstacleScene,
    RejectionSamplerManager,
};
use marga_plan::model::PlanningScene;
use marga_plan::space::{ModelStateSpace, PlanningState, StateSampler, StateSamplerAllocator};

struct CountingManager {
    calls: Arc<AtomicUsize>,
    select: bool,
}

impl ConstraintSamplerManager for CountingManager {
    fn select_sampler(
        &self,
        scene: &dyn PlanningScene,
        group: &str,
        constraints: &Constraints,
    ) -> Option<Arc<dyn ConstraintSampler>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.select {
            RejectionSamplerManager.select_sampler(scene, group, constraints)
        } else {
            None
        }
    }
}

struct SentinelSampler {
    dimension: usize,
}

impl StateSampler for SentinelSampler {
    fn sample_uniform(&mut self, out: &mut PlanningState) {
        out.values = vec![0.123; self.dimension];
    }
}

struct SentinelLibrary;

impl ConstraintApproximationLibrary for SentinelLibrary {
    fn sampler_allocator(&self, _constraints: &Constraints) -> Option<StateSamplerAllocator> {
        Some(Arc::new(|space: &Arc<ModelStateSpace>| {
            Some(Box::new(SentinelSampler {
                dimension: space.dimension(),
            }) as Box<dyn StateSampler>)
        }))
    }
}

fn make_context(
    manager: Arc<dyn ConstraintSamplerManager>,
    library: Option<Arc<dyn ConstraintApproximationLibrary>>,
) -> PlanningContext {
    let model = planar_point_model(0.0, 1.0);
    let space = ModelStateSpace::new(Arc::clone(&model), "base").unwrap();
    let scene = BoxObstacleScene::new("free", Arc::clone(&model), vec![]);
    let spec = PlanningContextSpec {
        space,
        constraint_sampler_manager: manager,
        constraint_approximations: library,
        planner_selector: rrt_planner_selector(),
        config: HashMap::new(),
        settings: ContextSettings::default(),
    };
    let mut context = PlanningContext::new("base", spec);
    context.set_planning_scene(scene);
    context
}

#[test]
fn approximation_sampler_preempts_manager() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut context = make_context(
        Arc::new(CountingManager {
            calls: Arc::clone(&calls),
            select: true,
        }),
        Some(Arc::new(SentinelLibrary)),
    );
    let path = joint_box_constraints("path", &[("x", 0.5, 0.4)]);
    context.set_path_constraints(&path).unwrap();

    let mut sampler = context.space().alloc_state_sampler();
    let mut state = PlanningState::zeros(2);
    sampler.sample_uniform(&mut state);
    assert_eq!(state.values, vec![0.123, 0.123]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn manager_consulted_without_library() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut context = make_context(
        Arc::new(CountingManager {
            calls: Arc::clone(&calls),
            select: true,
        }),
        None,
    );
    let path = joint_box_constraints("path", &[("x", 0.5, 0.45)]);
    context.set_path_constraints(&path).unwrap();

    let mut sampler = context.space().alloc_state_sampler();
    let mut state = PlanningState::zeros(2);
    sampler.sample_uniform(&mut state);
    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert!(context.space().satisfies_bounds(&state));
}

#[test]
fn uniform_default_when_manager_declines() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut context = make_context(
        Arc::new(CountingManager {
            calls: Arc::clone(&calls),
            select: false,
        }),
        None,
    );
    let path = joint_box_constraints("path", &[("x", 0.5, 0.4)]);
    context.set_path_constraints(&path).unwrap();

    let mut sampler = context.space().alloc_state_sampler();
    let mut state = PlanningState::zeros(2);
    for _ in 0..20 {
        sampler.sample_uniform(&mut state);
        assert!(context.space().satisfies_bounds(&state));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn decision_rechecked_per_allocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut context = make_context(
        Arc::new(CountingManager {
            calls: Arc::clone(&calls),
            select: true,
        }),
        None,
    );

    // No path constraints yet: the factory skips the manager.
    let _ = context.space().alloc_state_sampler();
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // After constraints are installed a fresh allocation consults it.
    let path = joint_box_constraints("path", &[("x", 0.5, 0.4)]);
    context.set_path_constraints(&path).unwrap();
    let _ = context.space().alloc_state_sampler();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
