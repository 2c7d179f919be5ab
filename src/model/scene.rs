//! Planning scene contract.

use std::sync::Arc;

use super::{RobotModel, RobotState};

/// World the robot plans in: model access plus validity queries.
///
/// Collision checking internals live behind this trait; the planning
/// layer holds the scene as a read-only shared reference for the
/// duration of a solve. Callers must not mutate the scene mid-solve.
pub trait PlanningScene: Send + Sync {
    /// Scene name, used for benchmark experiment naming.
    fn name(&self) -> &str;

    /// The kinematics model this scene was built for.
    fn robot_model(&self) -> &Arc<RobotModel>;

    /// Whether the given full configuration is collision free.
    ///
    /// With `verbose` set, implementations should log the outcome of
    /// individual checks.
    fn is_state_valid(&self, state: &RobotState, verbose: bool) -> bool;
}
