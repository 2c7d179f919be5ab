//! Robot trajectories: the downstream output of a planning query.

use crate::model::RobotState;

/// One trajectory point: a full configuration and the time offset from
/// the previous waypoint. Planning emits zero offsets; timing is
/// assigned downstream.
#[derive(Clone, Debug)]
pub struct TrajectoryWaypoint {
    pub state: RobotState,
    pub time_from_previous: f64,
}

/// Ordered sequence of waypoints over the full robot configuration.
#[derive(Clone, Debug, Default)]
pub struct RobotTrajectory {
    waypoints: Vec<TrajectoryWaypoint>,
}

impl RobotTrajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
    }

    pub fn add_suffix_waypoint(&mut self, state: RobotState, time_from_previous: f64) {
        self.waypoints.push(TrajectoryWaypoint {
            state,
            time_from_previous,
        });
    }

    pub fn waypoints(&self) -> &[TrajectoryWaypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn first(&self) -> Option<&TrajectoryWaypoint> {
        self.waypoints.first()
    }

    pub fn last(&self) -> Option<&TrajectoryWaypoint> {
        self.waypoints.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_clear() {
        let mut traj = RobotTrajectory::new();
        assert!(traj.is_empty());
        traj.add_suffix_waypoint(RobotState { values: vec![1.0] }, 0.0);
        traj.add_suffix_waypoint(RobotState { values: vec![2.0] }, 0.0);
        assert_eq!(traj.len(), 2);
        assert_eq!(traj.first().unwrap().state.values[0], 1.0);
        assert_eq!(traj.last().unwrap().state.values[0], 2.0);
        traj.clear();
        assert!(traj.is_empty());
    }
}
