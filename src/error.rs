//! Error types for marga-plan.

use thiserror::Error;

/// Errors surfaced while configuring a planning context or query.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("no planning scene has been set")]
    NoPlanningScene,

    #[error("link '{0}' is not known to the kinematic model")]
    UnknownLink(String),

    #[error("no valid joints specified for joint projection")]
    NoValidJoints,

    #[error("unable to allocate projection evaluator based on description: '{0}'")]
    BadProjectionExpression(String),

    #[error("planner type '{0}' is not known to the planner selector")]
    UnknownPlannerType(String),

    #[error("no goal constraint set yields a constraint sampler")]
    InvalidGoalConstraints,

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for PlanError {
    fn from(e: toml::de::Error) -> Self {
        PlanError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;

/// Outcome of a solve or follow attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannerStatus {
    /// A path satisfying start, goal and validity was found.
    ExactSolution,
    /// Only a path ending near the goal was found.
    ApproximateSolution,
    /// No valid start state.
    InvalidStart,
    /// No valid goal state could be produced.
    InvalidGoal,
    /// The goal representation cannot be used by the planner.
    UnrecognizedGoalType,
    /// The termination condition fired before a solution was found.
    Timeout,
}

impl PlannerStatus {
    /// True only for an exact solution.
    pub fn is_exact(self) -> bool {
        self == PlannerStatus::ExactSolution
    }

    /// True when any path (exact or approximate) was produced.
    pub fn solved(self) -> bool {
        matches!(
            self,
            PlannerStatus::ExactSolution | PlannerStatus::ApproximateSolution
        )
    }
}

impl std::fmt::Display for PlannerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlannerStatus::ExactSolution => "exact solution",
            PlannerStatus::ApproximateSolution => "approximate solution",
            PlannerStatus::InvalidStart => "invalid start",
            PlannerStatus::InvalidGoal => "invalid goal",
            PlannerStatus::UnrecognizedGoalType => "unrecognized goal type",
            PlannerStatus::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(PlannerStatus::ExactSolution.is_exact());
        assert!(!PlannerStatus::ApproximateSolution.is_exact());
        assert!(PlannerStatus::ApproximateSolution.solved());
        assert!(!PlannerStatus::Timeout.solved());
    }

    #[test]
    fn test_error_display() {
        let e = PlanError::UnknownLink("tool0".into());
        assert_eq!(
            e.to_string(),
            "link 'tool0' is not known to the kinematic model"
        );
    }
}
