//! # Marga-Plan: Constrained Motion-Planning Context
//!
//! A coordinator that adapts a sampling-based planning engine to a
//! robot kinematics model subject to path and goal constraints, plus a
//! sequential constraint-set planner that plans through an ordered
//! chain of constrained regions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use marga_plan::context::{PlanningContext, PlanningContextSpec, ContextSettings};
//! use marga_plan::harness::{
//!     planar_point_model, joint_box_constraints, rrt_planner_selector,
//!     BoxObstacleScene, RejectionSamplerManager,
//! };
//! use marga_plan::space::ModelStateSpace;
//! use marga_plan::trajectory::RobotTrajectory;
//!
//! let model = planar_point_model(0.0, 1.0);
//! let space = ModelStateSpace::new(Arc::clone(&model), "base").unwrap();
//! let scene = BoxObstacleScene::new("free", Arc::clone(&model), vec![]);
//!
//! let spec = PlanningContextSpec {
//!     space,
//!     constraint_sampler_manager: Arc::new(RejectionSamplerManager),
//!     constraint_approximations: None,
//!     planner_selector: rrt_planner_selector(),
//!     config: Default::default(),
//!     settings: ContextSettings::default(),
//! };
//! let mut context = PlanningContext::new("base", spec);
//! context.set_planning_scene(scene);
//! let goal = joint_box_constraints("goal", &[("x", 0.9, 0.05), ("y", 0.9, 0.05)]);
//! context.set_goal_constraints(&[goal], None).unwrap();
//! context.configure().unwrap();
//!
//! if context.solve(1.0, 1) {
//!     let mut trajectory = RobotTrajectory::new();
//!     context.get_solution_path(&mut trajectory);
//!     println!("solved with {} waypoints", trajectory.len());
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`model`]: kinematics model, robot states, the planning-scene contract
//! - [`space`]: state space over a joint group, samplers, projections
//! - [`constraints`]: constraint messages, evaluators, sampler contracts
//! - [`goal`]: constrained goal sampling and goal unions
//! - [`engine`]: space information, problem definition, planners, setup
//! - [`context`]: the planning-context orchestrator and parallel solves
//! - [`follower`]: the sequential constraint-set planner
//! - [`trajectory`]: robot-trajectory export
//! - [`harness`]: scenario builders for tests and demos
//!
//! ## Concurrency
//!
//! The context is single-threaded per call; parallel solves launch
//! planner threads bounded by `max_planning_threads`; goal regions may
//! sample lazily on a background thread. Cancellation goes through
//! [`context::TerminationHandle`], safe to use from any thread.

pub mod constraints;
pub mod context;
pub mod engine;
pub mod error;
pub mod follower;
pub mod goal;
pub mod harness;
pub mod model;
pub mod space;
pub mod trajectory;

// Re-export the main types at crate root.
pub use context::{
    ContextSettings, PlannerSelector, PlanningContext, PlanningContextSpec, TerminationHandle,
    WorkspaceBounds,
};
pub use error::{PlanError, PlannerStatus, Result};
pub use follower::Follower;
pub use model::{RobotModel, RobotState};
pub use space::ModelStateSpace;
pub use trajectory::RobotTrajectory;
