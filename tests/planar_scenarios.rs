//! End-to-end planning scenarios on a planar point robot.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use marga_plan::context::{ContextSettings, PlanningContext, PlanningContextSpec};
use marga_plan::harness::{
    joint_box_constraints, planar_point_model, rrt_planner_selector, BoxObstacle,
    BoxObstacleScene, RejectionSamplerManager,
};
use marga_plan::model::{RobotModel, RobotState};
use marga_plan::space::ModelStateSpace;
use marga_plan::trajectory::RobotTrajectory;

fn make_context(
    obstacles: Vec<BoxObstacle>,
    config: HashMap<String, String>,
    settings: ContextSettings,
) -> (PlanningContext, Arc<RobotModel>) {
    let model = planar_point_model(0.0, 1.0);
    let space = ModelStateSpace::new(Arc::clone(&model), "base").unwrap();
    let scene = BoxObstacleScene::new("planar", Arc::clone(&model), obstacles);

    let spec = PlanningContextSpec {
        space,
        constraint_sampler_manager: Arc::new(RejectionSamplerManager),
        constraint_approximations: None,
        planner_selector: rrt_planner_selector(),
        config,
        settings,
    };
    let mut context = PlanningContext::new("base", spec);
    context.set_planning_scene(scene);
    (context, model)
}

fn start_at(model: &Arc<RobotModel>, x: f64, y: f64) -> RobotState {
    let mut state = RobotState::default_for(model);
    state.values = vec![x, y];
    state
}

#[test]
fn trivial_straight_line() {
    let (mut context, model) = make_context(vec![], HashMap::new(), ContextSettings::default());
    context.set_complete_initial_state(start_at(&model, 0.0, 0.0));
    let goal = joint_box_constraints("goal", &[("x", 0.95, 0.05), ("y", 0.95, 0.05)]);
    context.set_goal_constraints(&[goal], None).unwrap();
    context.configure().unwrap();

    assert!(context.solve(5.0, 1));

    let mut trajectory = RobotTrajectory::new();
    assert!(context.get_solution_path(&mut trajectory));
    let first = &trajectory.first().unwrap().state;
    assert!(first.values[0].abs() < 1e-9 && first.values[1].abs() < 1e-9);
    let last = &trajectory.last().unwrap().state;
    assert!(last.values[0] >= 0.9 && last.values[1] >= 0.9);
    // Planning emits zero time offsets.
    assert!(trajectory
        .waypoints()
        .iter()
        .all(|w| w.time_from_previous == 0.0));
}

#[test]
fn projection_installed_from_config() {
    let mut config = HashMap::new();
    config.insert("projection_evaluator".to_string(), "joints(x,y)".to_string());
    config.insert("type".to_string(), "RRT".to_string());
    let (mut context, model) = make_context(vec![], config, ContextSettings::default());
    context.set_complete_initial_state(start_at(&model, 0.1, 0.1));
    let goal = joint_box_constraints("goal", &[("x", 0.9, 0.05)]);
    context.set_goal_constraints(&[goal], None).unwrap();
    context.configure().unwrap();

    let projection = context.space().default_projection().unwrap();
    assert_eq!(projection.dimensions(), 2);
}

#[test]
fn zero_dof_projection_not_installed() {
    let mut config = HashMap::new();
    // z has no degrees of freedom, so no projection can be built.
    config.insert("projection_evaluator".to_string(), "joints(z)".to_string());
    let (mut context, model) = make_context(vec![], config, ContextSettings::default());
    context.set_complete_initial_state(start_at(&model, 0.1, 0.1));
    let goal = joint_box_constraints("goal", &[("x", 0.9, 0.05)]);
    context.set_goal_constraints(&[goal], None).unwrap();
    // The projection failure is recoverable; configuration proceeds.
    context.configure().unwrap();
    assert!(context.space().default_projection().is_none());
}

#[test]
fn multi_goal_union() {
    let (mut context, model) = make_context(vec![], HashMap::new(), ContextSettings::default());
    context.set_complete_initial_state(start_at(&model, 0.5, 0.5));
    let goal_a = joint_box_constraints("a", &[("x", 0.1, 0.05), ("y", 0.5, 0.05)]);
    let goal_b = joint_box_constraints("b", &[("x", 0.9, 0.05), ("y", 0.5, 0.05)]);
    context
        .set_goal_constraints(&[goal_a, goal_b], None)
        .unwrap();
    context.configure().unwrap();

    assert!(context.solve(5.0, 1));

    let mut trajectory = RobotTrajectory::new();
    assert!(context.get_solution_path(&mut trajectory));
    let last = &trajectory.last().unwrap().state;
    let in_a = (last.values[0] - 0.1).abs() <= 0.05 && (last.values[1] - 0.5).abs() <= 0.05;
    let in_b = (last.values[0] - 0.9).abs() <= 0.05 && (last.values[1] - 0.5).abs() <= 0.05;
    assert!(in_a || in_b);
}

#[test]
fn no_goal_samplers_reports_invalid_goal_constraints() {
    let (mut context, model) = make_context(vec![], HashMap::new(), ContextSettings::default());
    context.set_complete_initial_state(start_at(&model, 0.5, 0.5));
    // Constraints on unknown joints resolve to empty sets.
    let goal = joint_box_constraints("ghost", &[("ghost", 0.5, 0.1)]);
    let err = context.set_goal_constraints(&[goal], None).unwrap_err();
    assert!(matches!(
        err,
        marga_plan::PlanError::InvalidGoalConstraints
    ));
}

#[test]
fn cancellation_mid_solve() {
    // The goal region is walled off, so the solve cannot finish on its own.
    let walls = vec![
        BoxObstacle::new([0.78, 0.78], [0.80, 1.0]),
        BoxObstacle::new([0.78, 0.78], [1.0, 0.80]),
    ];
    let (mut context, model) = make_context(walls, HashMap::new(), ContextSettings::default());
    context.set_complete_initial_state(start_at(&model, 0.1, 0.1));
    let goal = joint_box_constraints("walled", &[("x", 0.9, 0.05), ("y", 0.9, 0.05)]);
    context.set_goal_constraints(&[goal], None).unwrap();
    context.configure().unwrap();

    let handle = context.termination_handle();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        handle.terminate();
    });

    let begin = Instant::now();
    let solved = context.solve(60.0, 1);
    let elapsed = begin.elapsed();
    canceller.join().unwrap();

    assert!(!solved);
    assert!(elapsed < Duration::from_secs(2), "solve took {:?}", elapsed);

    // After unregistration this is a no-op.
    context.terminate_solve();

    // The context remains usable for a fresh, reachable query.
    context.clear();
    let goal = joint_box_constraints("free", &[("x", 0.5, 0.05), ("y", 0.5, 0.05)]);
    context.set_goal_constraints(&[goal], None).unwrap();
    context.configure().unwrap();
    assert!(context.solve(5.0, 1));
}

#[test]
fn parallel_solve_with_batches() {
    let settings = ContextSettings {
        max_planning_threads: 4,
        ..Default::default()
    };
    let (mut context, model) = make_context(vec![], HashMap::new(), settings);
    context.set_complete_initial_state(start_at(&model, 0.0, 0.0));
    let goal = joint_box_constraints("goal", &[("x", 0.9, 0.08), ("y", 0.9, 0.08)]);
    context.set_goal_constraints(&[goal], None).unwrap();
    context.configure().unwrap();

    // count=10 with four threads runs batches of 4, 4 and 2.
    assert!(context.solve(30.0, 10));
    let mut trajectory = RobotTrajectory::new();
    assert!(context.get_solution_path(&mut trajectory));
}

#[test]
fn interpolation_densifies_solution() {
    let (mut context, model) = make_context(vec![], HashMap::new(), ContextSettings::default());
    context.set_complete_initial_state(start_at(&model, 0.0, 0.0));
    let goal = joint_box_constraints("goal", &[("x", 0.95, 0.05), ("y", 0.95, 0.05)]);
    context.set_goal_constraints(&[goal], None).unwrap();
    context.configure().unwrap();
    assert!(context.solve(5.0, 1));

    context.simplify_solution(0.2);
    context.interpolate_solution();

    let mut trajectory = RobotTrajectory::new();
    assert!(context.get_solution_path(&mut trajectory));
    // Path length is at least the start-goal distance (about 1.27) and
    // the default segment cap is 1% of the space extent, so the
    // interpolated path carries a dense waypoint set.
    assert!(trajectory.len() >= 50, "only {} waypoints", trajectory.len());
}

#[test]
fn benchmark_writes_results_file() {
    let (mut context, model) = make_context(vec![], HashMap::new(), ContextSettings::default());
    context.set_complete_initial_state(start_at(&model, 0.0, 0.0));
    let goal = joint_box_constraints("goal", &[("x", 0.9, 0.08), ("y", 0.9, 0.08)]);
    context.set_goal_constraints(&[goal], None).unwrap();
    context.configure().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("runs.csv");
    assert!(context.benchmark(2.0, 3, Some(file.to_str().unwrap())));

    let contents = std::fs::read_to_string(&file).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    // Header comment, column row, one record per run.
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("# experiment: planar_point_base_planar_base"));
    assert_eq!(lines[1], "run,status,planning_time_s,path_length");
}

#[test]
fn clear_preserves_space_signature() {
    let (mut context, model) = make_context(vec![], HashMap::new(), ContextSettings::default());
    context.set_complete_initial_state(start_at(&model, 0.0, 0.0));
    let goal = joint_box_constraints("goal", &[("x", 0.9, 0.05)]);
    context.set_goal_constraints(&[goal.clone()], None).unwrap();
    context.configure().unwrap();
    let before = context.space().signature();

    context.clear();
    context.set_goal_constraints(&[goal], None).unwrap();
    context.configure().unwrap();
    let after = context.space().signature();

    assert_eq!(before, after);
    assert_eq!(context.space_signature(), &before[..]);
}
