//! Plans a planar point robot through two constraint gates, then
//! solves the same scene with the sampling-based engine directly.
//!
//! Run with `cargo run --example planar_demo`.

use std::collections::HashMap;
use std::sync::Arc;

use marga_plan::context::{ContextSettings, PlanningContext, PlanningContextSpec};
use marga_plan::harness::{
    joint_box_constraints, planar_point_model, rrt_planner_selector, BoxObstacle,
    BoxObstacleScene, RejectionSamplerManager,
};
use marga_plan::model::RobotState;
use marga_plan::space::ModelStateSpace;
use marga_plan::trajectory::RobotTrajectory;

fn main() {
    env_logger::init();

    let model = planar_point_model(0.0, 1.0);
    let space = ModelStateSpace::new(Arc::clone(&model), "base").unwrap();
    // Two walls with gaps around y = 0.5.
    let scene = BoxObstacleScene::new(
        "gates",
        Arc::clone(&model),
        vec![
            BoxObstacle::new([0.30, 0.0], [0.35, 0.40]),
            BoxObstacle::new([0.30, 0.60], [0.35, 1.0]),
            BoxObstacle::new([0.60, 0.0], [0.65, 0.40]),
            BoxObstacle::new([0.60, 0.60], [0.65, 1.0]),
        ],
    );

    let mut config = HashMap::new();
    config.insert("type".to_string(), "RRT".to_string());
    config.insert("projection_evaluator".to_string(), "joints(x,y)".to_string());

    let spec = PlanningContextSpec {
        space,
        constraint_sampler_manager: Arc::new(RejectionSamplerManager),
        constraint_approximations: None,
        planner_selector: rrt_planner_selector(),
        config,
        settings: ContextSettings::default(),
    };
    let mut context = PlanningContext::new("base", spec);
    context.set_planning_scene(scene);

    let mut start = RobotState::default_for(&model);
    start.values = vec![0.1, 0.5];
    context.set_complete_initial_state(start);

    let gates = vec![
        joint_box_constraints("gate1", &[("x", 0.325, 0.025), ("y", 0.5, 0.08)]),
        joint_box_constraints("gate2", &[("x", 0.625, 0.025), ("y", 0.5, 0.08)]),
    ];
    context.set_follow_constraints(&gates).expect("gate samplers");

    let goal = joint_box_constraints("goal", &[("x", 0.9, 0.05), ("y", 0.5, 0.05)]);
    context
        .set_goal_constraints(&[goal], None)
        .expect("goal representation");
    context.configure().expect("configuration");

    println!("following the gate chain...");
    if context.follow(5.0, 1) {
        let mut trajectory = RobotTrajectory::new();
        context.get_solution_path(&mut trajectory);
        println!("follow plan with {} waypoints:", trajectory.len());
        for (i, w) in trajectory.waypoints().iter().enumerate() {
            println!("  {}: ({:.3}, {:.3})", i, w.state.values[0], w.state.values[1]);
        }
    } else {
        println!("follow failed");
    }

    println!("solving the same scene with the engine planner...");
    context.set_follow_samplers(Vec::new());
    context.configure().expect("configuration");
    if context.solve(5.0, 1) {
        context.simplify_solution(0.5);
        context.interpolate_solution();
        let mut trajectory = RobotTrajectory::new();
        context.get_solution_path(&mut trajectory);
        println!(
            "solved in {:.3}s, {} waypoints after interpolation",
            context.last_plan_time().as_secs_f64(),
            trajectory.len()
        );
    } else {
        println!("solve failed");
    }
}
