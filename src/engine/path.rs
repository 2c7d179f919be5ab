//! Geometric paths in the planning space.

use crate::space::{ModelStateSpace, PlanningState};

/// An ordered sequence of planning states.
#[derive(Clone, Debug, Default)]
pub struct PathGeometric {
    states: Vec<PlanningState>,
}

impl PathGeometric {
    pub fn new() -> Self {
        Self { states: Vec::new() }
    }

    pub fn append(&mut self, state: PlanningState) {
        self.states.push(state);
    }

    pub fn reverse(&mut self) {
        self.states.reverse();
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> &[PlanningState] {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut Vec<PlanningState> {
        &mut self.states
    }

    /// Sum of segment lengths under the space metric.
    pub fn length(&self, space: &ModelStateSpace) -> f64 {
        self.states
            .windows(2)
            .map(|w| space.distance(&w[0], &w[1]))
            .sum()
    }

    /// Insert evenly spaced intermediate states so the path has at
    /// least `count` waypoints, distributing the additions over the
    /// segments proportionally to their length. A shorter request or a
    /// path with fewer than two states is left untouched.
    pub fn interpolate(&mut self, space: &ModelStateSpace, count: usize) {
        if self.states.len() >= count || self.states.len() < 2 {
            return;
        }

        let lengths: Vec<f64> = self
            .states
            .windows(2)
            .map(|w| space.distance(&w[0], &w[1]))
            .collect();
        let total: f64 = lengths.iter().sum();
        let to_add = count - self.states.len();

        // Largest-remainder apportionment of the new states.
        let mut added = vec![0usize; lengths.len()];
        if total > 0.0 {
            let mut remainders: Vec<(usize, f64)> = Vec::with_capacity(lengths.len());
            let mut assigned = 0;
            for (i, len) in lengths.iter().enumerate() {
                let exact = to_add as f64 * len / total;
                added[i] = exact.floor() as usize;
                assigned += added[i];
                remainders.push((i, exact - exact.floor()));
            }
            remainders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            for &(i, _) in remainders.iter().take(to_add - assigned) {
                added[i] += 1;
            }
        } else {
            added[0] = to_add;
        }

        let mut result = Vec::with_capacity(count);
        for (i, extra) in added.iter().enumerate() {
            result.push(self.states[i].clone());
            let mut work = PlanningState::zeros(space.dimension());
            for k in 1..=*extra {
                let t = k as f64 / (*extra + 1) as f64;
                space.interpolate(&self.states[i], &self.states[i + 1], t, &mut work);
                result.push(work.clone());
            }
        }
        result.push(self.states[self.states.len() - 1].clone());
        self.states = result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Joint, JointGroup, Link, RobotModel};
    use std::sync::Arc;

    fn line_space() -> Arc<ModelStateSpace> {
        let joints = vec![Joint::prismatic("x", [1.0, 0.0], (0.0, 10.0))];
        let links = vec![Link::new("tip", 0, [0.0, 0.0])];
        let groups = vec![JointGroup::new("base", vec![0])];
        let model = RobotModel::new("line", joints, links, groups);
        ModelStateSpace::new(model, "base").unwrap()
    }

    fn state(x: f64) -> PlanningState {
        PlanningState { values: vec![x] }
    }

    #[test]
    fn test_length() {
        let space = line_space();
        let mut path = PathGeometric::new();
        path.append(state(0.0));
        path.append(state(2.0));
        path.append(state(5.0));
        assert!((path.length(&space) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_reaches_count() {
        let space = line_space();
        let mut path = PathGeometric::new();
        path.append(state(0.0));
        path.append(state(1.0));
        path.append(state(4.0));
        path.interpolate(&space, 9);
        assert_eq!(path.state_count(), 9);
        // Endpoints and the original knot survive.
        assert_eq!(path.states()[0].values[0], 0.0);
        assert_eq!(path.states()[8].values[0], 4.0);
        // Monotone along the line.
        for w in path.states().windows(2) {
            assert!(w[1].values[0] >= w[0].values[0]);
        }
    }

    #[test]
    fn test_interpolate_noop_when_enough_states() {
        let space = line_space();
        let mut path = PathGeometric::new();
        path.append(state(0.0));
        path.append(state(1.0));
        path.interpolate(&space, 2);
        assert_eq!(path.state_count(), 2);
    }

    #[test]
    fn test_reverse() {
        let mut path = PathGeometric::new();
        path.append(state(0.0));
        path.append(state(1.0));
        path.reverse();
        assert_eq!(path.states()[0].values[0], 1.0);
    }
}
