//! Context configuration.

use serde::Deserialize;

use crate::error::Result;

/// Tunables of a planning context, loadable from TOML.
#[derive(Clone, Debug, Deserialize)]
pub struct ContextSettings {
    /// Cap on buffered goal samples per goal region.
    #[serde(default = "default_max_goal_samples")]
    pub max_goal_samples: usize,

    /// Attempt budget for one constrained state draw.
    #[serde(default = "default_max_state_sampling_attempts")]
    pub max_state_sampling_attempts: u32,

    /// Consecutive failed goal draws before the region is exhausted.
    #[serde(default = "default_max_goal_sampling_attempts")]
    pub max_goal_sampling_attempts: u32,

    /// Thread cap for parallel solve batches.
    #[serde(default = "default_max_planning_threads")]
    pub max_planning_threads: u32,

    /// Target segment length for solution interpolation.
    /// Non-positive selects 1% of the space extent.
    #[serde(default)]
    pub max_solution_segment_length: f64,

    /// Lower bound on interpolated waypoint count.
    #[serde(default = "default_minimum_waypoint_count")]
    pub minimum_waypoint_count: usize,

    /// Motion checks sample at this fraction of the space extent.
    #[serde(default = "default_longest_valid_segment_fraction")]
    pub longest_valid_segment_fraction: f64,

    /// Parallel-solve success policy: true requires every batch to
    /// succeed, false accepts any successful batch.
    #[serde(default = "default_require_all_batches")]
    pub require_all_batches: bool,
}

fn default_max_goal_samples() -> usize {
    10
}

fn default_max_state_sampling_attempts() -> u32 {
    4
}

fn default_max_goal_sampling_attempts() -> u32 {
    1000
}

fn default_max_planning_threads() -> u32 {
    4
}

fn default_minimum_waypoint_count() -> usize {
    2
}

fn default_longest_valid_segment_fraction() -> f64 {
    0.01
}

fn default_require_all_batches() -> bool {
    true
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            max_goal_samples: default_max_goal_samples(),
            max_state_sampling_attempts: default_max_state_sampling_attempts(),
            max_goal_sampling_attempts: default_max_goal_sampling_attempts(),
            max_planning_threads: default_max_planning_threads(),
            max_solution_segment_length: 0.0,
            minimum_waypoint_count: default_minimum_waypoint_count(),
            longest_valid_segment_fraction: default_longest_valid_segment_fraction(),
            require_all_batches: default_require_all_batches(),
        }
    }
}

impl ContextSettings {
    /// Load settings from a TOML document; missing fields take their
    /// defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
