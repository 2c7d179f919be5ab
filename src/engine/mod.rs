//! Minimal sampling-based planning engine: space information, problem
//! definition, geometric paths, termination conditions, planners and
//! the simple-setup wiring the context drives.

pub mod benchmark;
pub mod path;
pub mod planner;
pub mod problem;
pub mod simple_setup;
pub mod space_info;
pub mod termination;

pub use benchmark::{Benchmark, BenchmarkRequest};
pub use path::PathGeometric;
pub use planner::{default_planner, Planner, PlannerAllocator, RrtPlanner};
pub use problem::{ProblemDefinition, Solution};
pub use simple_setup::SimpleSetup;
pub use space_info::{SpaceInformation, StateValidityChecker};
pub use termination::TerminationCondition;
