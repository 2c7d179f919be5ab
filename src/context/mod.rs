//! Planning-context orchestration.
//!
//! `PlanningContext` translates a task-level specification (start
//! state, path constraints, goal constraints, workspace, planner
//! choice) into a configured planning problem over the model state
//! space, and drives solve / follow / simplify / interpolate /
//! benchmark with cancellable termination.

pub mod parallel;
mod settings;

pub use parallel::ParallelSolveScheduler;
pub use settings::ContextSettings;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::constraints::{
    ConstraintApproximationLibrary, ConstraintSamplerManager, ConstraintSet, Constraints,
    ValidConstrainedSampler,
};
use crate::engine::{
    Benchmark, BenchmarkRequest, Planner, PlannerAllocator, SimpleSetup, SpaceInformation,
    StateValidityChecker, TerminationCondition,
};
use crate::error::{PlanError, Result};
use crate::follower::Follower;
use crate::goal::{ConstrainedGoalSampler, GoalRegion, GoalRegionMux};
use crate::model::{PlanningScene, RobotState};
use crate::space::{
    resolve_projection, ConstrainedSampler, ModelStateSpace, StateSampler, StateSamplerAllocator,
};
use crate::trajectory::RobotTrajectory;

/// Allocator bound to a context name and spec, produced by the
/// planner selector for a planner type string.
pub type ConfiguredPlannerAllocator =
    Arc<dyn Fn(Arc<SpaceInformation>, &str, &PlanningContextSpec) -> Box<dyn Planner> + Send + Sync>;

/// Maps a planner type name to an allocator.
pub type PlannerSelector = Arc<dyn Fn(&str) -> Option<ConfiguredPlannerAllocator> + Send + Sync>;

/// Axis-aligned workspace bounds applied to planar/floating joints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

/// Immutable bundle a context is created from.
#[derive(Clone)]
pub struct PlanningContextSpec {
    pub space: Arc<ModelStateSpace>,
    pub constraint_sampler_manager: Arc<dyn ConstraintSamplerManager>,
    pub constraint_approximations: Option<Arc<dyn ConstraintApproximationLibrary>>,
    pub planner_selector: PlannerSelector,
    /// Planner configuration map; `projection_evaluator` and `type`
    /// are consumed, the remainder becomes engine parameters.
    pub config: HashMap<String, String>,
    pub settings: ContextSettings,
}

/// Inputs of the state-sampler factory decision, shared with the
/// allocator closure installed on the space. Re-read on every
/// allocation so per-query changes take effect immediately.
#[derive(Default)]
struct SamplerFactoryState {
    scene: Option<Arc<dyn PlanningScene>>,
    path_constraints_msg: Option<Constraints>,
    reference: Option<RobotState>,
}

/// State validity bound to a scene and the current path constraints.
struct ContextValidityChecker {
    space: Arc<ModelStateSpace>,
    scene: Arc<dyn PlanningScene>,
    path_constraints: Option<Arc<ConstraintSet>>,
    reference: RobotState,
    verbose: Arc<AtomicBool>,
}

impl StateValidityChecker for ContextValidityChecker {
    fn is_valid(&self, state: &crate::space::PlanningState) -> bool {
        let verbose = self.verbose.load(Ordering::Relaxed);
        let mut robot = self.reference.clone();
        self.space.copy_to_robot_state(&mut robot, state);

        if let Some(constraints) = &self.path_constraints {
            if !constraints.decide(&robot) {
                if verbose {
                    info!("state rejected by path constraints");
                }
                return false;
            }
        }
        self.scene.is_state_valid(&robot, verbose)
    }
}

/// Returned by [`PlanningContext::termination_handle`]; lets another
/// thread cancel whatever solve or follow is currently registered.
#[derive(Clone)]
pub struct TerminationHandle {
    slot: Arc<Mutex<Option<Arc<TerminationCondition>>>>,
}

impl TerminationHandle {
    /// Terminate the currently registered condition, if any. A no-op
    /// when nothing is registered.
    pub fn terminate(&self) {
        if let Some(ptc) = self.slot.lock().as_ref() {
            ptc.terminate();
        }
    }
}

/// Unregisters the termination condition on every exit path.
struct TerminationGuard {
    slot: Arc<Mutex<Option<Arc<TerminationCondition>>>>,
}

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// Central coordinator for one named planning configuration.
pub struct PlanningContext {
    name: String,
    spec: PlanningContextSpec,
    complete_initial_state: RobotState,
    scene: Option<Arc<dyn PlanningScene>>,
    setup: SimpleSetup,
    factory_state: Arc<RwLock<SamplerFactoryState>>,
    path_constraints: Option<Arc<ConstraintSet>>,
    goal_constraints: Vec<Arc<ConstraintSet>>,
    follow_samplers: Vec<Arc<ValidConstrainedSampler>>,
    ptc: Arc<Mutex<Option<Arc<TerminationCondition>>>>,
    space_signature: Vec<u8>,
    verbose_validity: Arc<AtomicBool>,
    last_plan_time: Duration,
    last_simplify_time: Duration,
}

impl PlanningContext {
    pub fn new(name: &str, spec: PlanningContextSpec) -> Self {
        let space = Arc::clone(&spec.space);
        let space_signature = space.signature();
        let setup = SimpleSetup::new(
            Arc::clone(&space),
            spec.settings.longest_valid_segment_fraction,
        );
        let complete_initial_state = RobotState::default_for(space.model());

        let factory_state = Arc::new(RwLock::new(SamplerFactoryState {
            scene: None,
            path_constraints_msg: None,
            reference: Some(complete_initial_state.clone()),
        }));
        space.set_state_sampler_allocator(Some(Self::make_sampler_allocator(
            name,
            &spec,
            &factory_state,
        )));

        Self {
            name: name.to_string(),
            spec,
            complete_initial_state,
            scene: None,
            setup,
            factory_state,
            path_constraints: None,
            goal_constraints: Vec::new(),
            follow_samplers: Vec::new(),
            ptc: Arc::new(Mutex::new(None)),
            space_signature,
            verbose_validity: Arc::new(AtomicBool::new(false)),
            last_plan_time: Duration::ZERO,
            last_simplify_time: Duration::ZERO,
        }
    }

    /// The three-tier sampler factory: precomputed approximation
    /// sampler, then a manager-selected constrained sampler, then
    /// `None` to fall through to the space-default uniform sampler.
    fn make_sampler_allocator(
        name: &str,
        spec: &PlanningContextSpec,
        factory_state: &Arc<RwLock<SamplerFactoryState>>,
    ) -> StateSamplerAllocator {
        let name = name.to_string();
        let manager = Arc::clone(&spec.constraint_sampler_manager);
        let library = spec.constraint_approximations.clone();
        let state = Arc::clone(factory_state);
        let max_attempts = spec.settings.max_state_sampling_attempts;

        Arc::new(move |space: &Arc<ModelStateSpace>| -> Option<Box<dyn StateSampler>> {
            debug!(
                "{}: allocating a new state sampler (attempts to use path constraints)",
                name
            );
            let st = state.read();
            if let Some(constraints_msg) = &st.path_constraints_msg {
                if let Some(library) = &library {
                    if let Some(allocator) = library.sampler_allocator(constraints_msg) {
                        if let Some(sampler) = allocator(space) {
                            debug!("using precomputed state sampler (approximated constraint space)");
                            return Some(sampler);
                        }
                    }
                }
                if let Some(scene) = &st.scene {
                    if let Some(cs) = manager.select_sampler(
                        scene.as_ref(),
                        space.group_name(),
                        constraints_msg,
                    ) {
                        debug!("{}: allocating specialized state sampler for state space", name);
                        let reference = st
                            .reference
                            .clone()
                            .unwrap_or_else(|| RobotState::default_for(space.model()));
                        return Some(Box::new(ConstrainedSampler::new(
                            Arc::clone(space),
                            cs,
                            reference,
                            max_attempts,
                        )));
                    }
                }
            }
            debug!("{}: allocating default state sampler for state space", name);
            None
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &PlanningContextSpec {
        &self.spec
    }

    pub fn space(&self) -> &Arc<ModelStateSpace> {
        &self.spec.space
    }

    pub fn space_information(&self) -> &Arc<SpaceInformation> {
        self.setup.space_information()
    }

    pub fn planning_scene(&self) -> Option<&Arc<dyn PlanningScene>> {
        self.scene.as_ref()
    }

    pub fn complete_initial_state(&self) -> &RobotState {
        &self.complete_initial_state
    }

    pub fn space_signature(&self) -> &[u8] {
        &self.space_signature
    }

    pub fn last_plan_time(&self) -> Duration {
        self.last_plan_time
    }

    pub fn last_simplify_time(&self) -> Duration {
        self.last_simplify_time
    }

    pub fn path_constraints(&self) -> Option<&Arc<ConstraintSet>> {
        self.path_constraints.as_ref()
    }

    pub fn set_planning_scene(&mut self, scene: Arc<dyn PlanningScene>) {
        self.factory_state.write().scene = Some(Arc::clone(&scene));
        self.scene = Some(scene);
    }

    /// Snapshot the full start configuration.
    pub fn set_complete_initial_state(&mut self, state: RobotState) {
        self.factory_state.write().reference = Some(state.clone());
        self.complete_initial_state = state;
    }

    pub fn set_planning_volume(&mut self, workspace: &WorkspaceBounds) {
        self.spec.space.set_planning_volume(
            workspace.min_x,
            workspace.max_x,
            workspace.min_y,
            workspace.max_y,
            workspace.min_z,
            workspace.max_z,
        );
    }

    /// Install path constraints for subsequent queries; the sampler
    /// factory decision picks them up on its next allocation.
    pub fn set_path_constraints(&mut self, constraints: &Constraints) -> Result<()> {
        let scene = self.scene.as_ref().ok_or(PlanError::NoPlanningScene)?;
        let set = ConstraintSet::new(Arc::clone(scene.robot_model()), constraints);
        self.path_constraints = Some(Arc::new(set));
        self.factory_state.write().path_constraints_msg = Some(constraints.clone());
        Ok(())
    }

    /// Resolve goal constraint sets, each merged with the path
    /// constraints, and install the goal representation.
    pub fn set_goal_constraints(
        &mut self,
        goal_constraints: &[Constraints],
        path_constraints: Option<&Constraints>,
    ) -> Result<()> {
        let scene = self.scene.as_ref().ok_or(PlanError::NoPlanningScene)?;
        let model = Arc::clone(scene.robot_model());

        self.goal_constraints.clear();
        for gc in goal_constraints {
            let merged = match path_constraints {
                Some(pc) => Constraints::merged(gc, pc),
                None => gc.clone(),
            };
            let set = ConstraintSet::new(Arc::clone(&model), &merged);
            if !set.is_empty() {
                self.goal_constraints.push(Arc::new(set));
            }
        }

        if self.goal_constraints.is_empty() {
            warn!("{}: no goal constraints specified, there is no problem to solve", self.name);
            return Err(PlanError::InvalidGoalConstraints);
        }

        let goal = self.construct_goal()?;
        self.setup.set_goal(Some(goal));
        Ok(())
    }

    /// Build the goal representation from the resolved goal constraint
    /// sets: one constrained goal sampler per set that yields a
    /// sampler, merged into a union region when there are several.
    fn construct_goal(&self) -> Result<Arc<dyn GoalRegion>> {
        let scene = self.scene.as_ref().ok_or(PlanError::NoPlanningScene)?;
        let space = &self.spec.space;
        let si = self.setup.space_information();

        let mut goals: Vec<Arc<dyn GoalRegion>> = Vec::new();
        for set in &self.goal_constraints {
            if let Some(cs) = self.spec.constraint_sampler_manager.select_sampler(
                scene.as_ref(),
                space.group_name(),
                set.message(),
            ) {
                goals.push(Arc::new(ConstrainedGoalSampler::new(
                    Arc::clone(space),
                    Arc::clone(si),
                    Arc::clone(set),
                    cs,
                    self.complete_initial_state.clone(),
                    self.spec.settings.max_goal_samples,
                    self.spec.settings.max_goal_sampling_attempts,
                )));
            }
        }

        match goals.len() {
            0 => {
                error!("{}: unable to construct goal representation", self.name);
                Err(PlanError::InvalidGoalConstraints)
            }
            1 => Ok(goals.pop().unwrap()),
            _ => Ok(Arc::new(GoalRegionMux::new(goals))),
        }
    }

    /// Install the default projection from an expression such as
    /// `link(tool)` or `joints(shoulder, elbow)`.
    pub fn set_projection_evaluator(&mut self, expression: &str) -> Result<()> {
        let projection = resolve_projection(
            &self.spec.space,
            &self.complete_initial_state,
            expression.trim(),
        )?;
        self.spec.space.register_default_projection(projection);
        Ok(())
    }

    pub fn set_verbose_state_validity_checks(&mut self, verbose: bool) {
        self.verbose_validity.store(verbose, Ordering::Relaxed);
    }

    /// Supply the ordered chain of constrained samplers consumed by
    /// [`follow`](Self::follow).
    pub fn set_follow_samplers(&mut self, samplers: Vec<Arc<ValidConstrainedSampler>>) {
        self.follow_samplers = samplers;
    }

    /// Build the follower chain from constraint messages, one sampler
    /// per message in order.
    pub fn set_follow_constraints(&mut self, constraints: &[Constraints]) -> Result<()> {
        let scene = self.scene.as_ref().ok_or(PlanError::NoPlanningScene)?;
        let model = Arc::clone(scene.robot_model());
        let space = &self.spec.space;

        let mut samplers = Vec::with_capacity(constraints.len());
        for (i, msg) in constraints.iter().enumerate() {
            let set = Arc::new(ConstraintSet::new(Arc::clone(&model), msg));
            let cs = self
                .spec
                .constraint_sampler_manager
                .select_sampler(scene.as_ref(), space.group_name(), msg)
                .ok_or_else(|| {
                    PlanError::Config(format!("no constraint sampler for follow set {}", i))
                })?;
            samplers.push(Arc::new(ValidConstrainedSampler::new(
                Arc::clone(space),
                cs,
                set,
                self.complete_initial_state.clone(),
                self.spec.settings.max_state_sampling_attempts,
            )));
        }
        self.follow_samplers = samplers;
        Ok(())
    }

    /// Wire the query: copy the start state into the planning space,
    /// install the state validity checker, apply the configuration
    /// map, and run engine setup once a goal is present and no
    /// follower chain is queued.
    pub fn configure(&mut self) -> Result<()> {
        let scene = self
            .scene
            .as_ref()
            .ok_or(PlanError::NoPlanningScene)?
            .clone();

        let start = self
            .spec
            .space
            .copy_to_planning_state(&self.complete_initial_state);
        self.setup.set_start_state(start);
        self.setup
            .set_state_validity_checker(Some(Arc::new(ContextValidityChecker {
                space: Arc::clone(&self.spec.space),
                scene,
                path_constraints: self.path_constraints.clone(),
                reference: self.complete_initial_state.clone(),
                verbose: Arc::clone(&self.verbose_validity),
            })));

        self.use_config()?;
        if self.setup.goal().is_some() && self.follow_samplers.is_empty() {
            self.setup.setup();
        }
        Ok(())
    }

    /// Apply the configuration map: consume `projection_evaluator`,
    /// bind the planner allocator from `type`, and forward the rest as
    /// engine parameters.
    fn use_config(&mut self) -> Result<()> {
        if self.spec.config.is_empty() {
            return Ok(());
        }
        let mut cfg = self.spec.config.clone();

        if let Some(expression) = cfg.remove("projection_evaluator") {
            if let Err(e) = self.set_projection_evaluator(expression.trim()) {
                error!("{}: {}", self.name, e);
            }
        }
        if cfg.is_empty() {
            return Ok(());
        }

        let group_name = self.spec.space.group_name().to_string();
        match cfg.remove("type") {
            None => {
                if self.name != group_name {
                    warn!(
                        "{}: attribute 'type' not specified in planner configuration",
                        self.name
                    );
                }
            }
            Some(planner_type) => match (self.spec.planner_selector)(&planner_type) {
                Some(allocator) => {
                    let sub_name = if self.name != group_name {
                        self.name.clone()
                    } else {
                        String::new()
                    };
                    let spec = self.spec.clone();
                    let bound: PlannerAllocator = Arc::new(move |si: Arc<SpaceInformation>| {
                        allocator(si, &sub_name, &spec)
                    });
                    self.setup.set_planner_allocator(Some(bound));
                    info!(
                        "planner configuration '{}' will use planner '{}'; additional parameters are set when the planner is constructed",
                        self.name, planner_type
                    );
                }
                None => {
                    error!(
                        "{}: {}",
                        self.name,
                        PlanError::UnknownPlannerType(planner_type)
                    );
                }
            },
        }

        // Setup before applying parameters so the planner exists, and
        // again after so new values take effect.
        self.setup.setup();
        self.setup.set_planner_params(cfg);
        self.setup.setup();
        Ok(())
    }

    /// Restore the context to a pre-solve state. The scene, the spec
    /// and the follower chain survive; a fresh configuration sequence
    /// yields an identical space signature.
    pub fn clear(&mut self) {
        self.setup.clear();
        self.setup.clear_start_states();
        self.setup.set_goal(None);
        self.setup.set_state_validity_checker(None);
        self.path_constraints = None;
        self.goal_constraints.clear();
        self.factory_state.write().path_constraints_msg = None;
    }

    fn register_termination_condition(&self, ptc: &Arc<TerminationCondition>) -> TerminationGuard {
        *self.ptc.lock() = Some(Arc::clone(ptc));
        TerminationGuard {
            slot: Arc::clone(&self.ptc),
        }
    }

    /// Terminate the currently registered solve or follow, if any.
    /// Idempotent; a no-op after the condition is unregistered.
    pub fn terminate_solve(&self) {
        if let Some(ptc) = self.ptc.lock().as_ref() {
            ptc.terminate();
        }
    }

    /// Handle for cancelling from another thread while this context is
    /// mutably borrowed by a running solve.
    pub fn termination_handle(&self) -> TerminationHandle {
        TerminationHandle {
            slot: Arc::clone(&self.ptc),
        }
    }

    fn pre_solve(&mut self) {
        self.setup.problem_definition().clear_solutions();
        if let Some(goal) = self.setup.goal() {
            if goal.has_lazy_samples() {
                goal.start_sampling();
            }
        }
        self.setup.space_information().reset_motion_counter();
    }

    fn post_solve(&mut self) {
        if let Some(goal) = self.setup.goal() {
            if goal.has_lazy_samples() {
                goal.stop_sampling();
            }
        }
        let (valid, invalid) = self.setup.space_information().motion_counts();
        debug!("there were {} valid motions and {} invalid motions", valid, invalid);
        if self.setup.problem_definition().has_approximate_solution() {
            warn!("computed solution is approximate");
        }
    }

    /// Solve the configured problem within `timeout` seconds.
    ///
    /// A `count` above one runs that many planner instances through
    /// the parallel scheduler. Returns true only for an exact solution
    /// (for batched runs, per the configured batch policy).
    pub fn solve(&mut self, timeout: f64, count: u32) -> bool {
        let start = Instant::now();
        self.pre_solve();

        let result = if count <= 1 {
            debug!("{}: solving the planning problem once", self.name);
            let budget = Duration::from_secs_f64(timeout).saturating_sub(start.elapsed());
            let ptc = TerminationCondition::with_timeout(budget);
            let _guard = self.register_termination_condition(&ptc);
            let status = self.setup.solve(&ptc);
            self.last_plan_time = self.setup.last_plan_time();
            status.is_exact()
        } else {
            debug!("{}: solving the planning problem {} times", self.name, count);
            let budget = Duration::from_secs_f64(timeout).saturating_sub(start.elapsed());
            let ptc = TerminationCondition::with_timeout(budget);
            let _guard = self.register_termination_condition(&ptc);
            let scheduler = ParallelSolveScheduler::new(
                Arc::clone(self.setup.space_information()),
                Arc::clone(self.setup.problem_definition()),
                self.setup.planner_allocator().cloned(),
                self.spec.settings.max_planning_threads,
                self.spec.settings.require_all_batches,
            );
            let result = scheduler.solve(count, &ptc);
            self.last_plan_time = start.elapsed();
            result
        };

        self.post_solve();
        result
    }

    /// Plan through the pre-configured follower chain within `timeout`
    /// seconds. The follower runs a single pass; `count` is accepted
    /// for call-site symmetry with [`solve`](Self::solve).
    pub fn follow(&mut self, timeout: f64, _count: u32) -> bool {
        let start = Instant::now();
        self.pre_solve();

        let follower = Follower::new(Arc::clone(self.setup.space_information()));
        let ptc = TerminationCondition::with_timeout(Duration::from_secs_f64(timeout));
        let result = {
            let _guard = self.register_termination_condition(&ptc);
            let status = follower.follow(
                &self.follow_samplers,
                self.setup.problem_definition(),
                &ptc,
            );
            self.last_plan_time = start.elapsed();
            status.is_exact()
        };

        self.post_solve();
        result
    }

    pub fn simplify_solution(&mut self, timeout: f64) {
        self.setup
            .simplify_solution(Duration::from_secs_f64(timeout));
        self.last_simplify_time = self.setup.last_simplify_time();
    }

    /// Densify the solution path to at least
    /// `max(round(length / max_segment), minimum_waypoint_count)`
    /// waypoints.
    pub fn interpolate_solution(&mut self) {
        if !self.setup.have_solution_path() {
            return;
        }
        let space = Arc::clone(&self.spec.space);
        let max_segment = if self.spec.settings.max_solution_segment_length > f64::EPSILON {
            self.spec.settings.max_solution_segment_length
        } else {
            space.maximum_extent() / 100.0
        };
        let minimum = self.spec.settings.minimum_waypoint_count;
        self.setup.problem_definition().modify_solution_path(|path| {
            let count = ((0.5 + path.length(&space) / max_segment).floor() as usize).max(minimum);
            path.interpolate(&space, count);
        });
    }

    /// Export the solution as a robot trajectory. Returns false when
    /// no solution exists.
    pub fn get_solution_path(&self, trajectory: &mut RobotTrajectory) -> bool {
        trajectory.clear();
        match self.setup.solution_path() {
            Some(path) => {
                let mut state = self.complete_initial_state.clone();
                for s in path.states() {
                    self.spec.space.copy_to_robot_state(&mut state, s);
                    trajectory.add_suffix_waypoint(state.clone(), 0.0);
                }
                true
            }
            None => false,
        }
    }

    /// Run the configured planner repeatedly and persist the results.
    /// The experiment is named `<model>_<group>_<scene>_<context>`.
    pub fn benchmark(&mut self, timeout: f64, run_count: u32, filename: Option<&str>) -> bool {
        self.setup.setup();
        let scene_name = self
            .scene
            .as_ref()
            .map(|s| s.name().to_string())
            .unwrap_or_default();
        let experiment = format!(
            "{}_{}_{}_{}",
            self.spec.space.model().name(),
            self.spec.space.group_name(),
            scene_name,
            self.name
        );

        let mut benchmark = Benchmark::new(&experiment);
        benchmark.run(
            self.setup.space_information(),
            self.setup.problem_definition(),
            self.setup.planner_allocator(),
            &BenchmarkRequest {
                max_time: timeout,
                run_count,
                display_progress: true,
            },
        );

        let file = filename
            .map(str::to_string)
            .unwrap_or_else(|| benchmark.default_filename());
        match benchmark.save_results_to_file(Path::new(&file)) {
            Ok(()) => true,
            Err(e) => {
                error!("{}: failed to save benchmark results: {}", self.name, e);
                false
            }
        }
    }
}
