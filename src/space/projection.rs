//! Projection evaluators and the expression grammar that selects them.
//!
//! Two forms are recognized: `link(NAME)` projects onto the Cartesian
//! position of a link, `joints(N1,N2,...)` onto the concatenated values
//! of named joints. Anything else is rejected.

use std::sync::Arc;

use log::{error, warn};

use crate::error::{PlanError, Result};
use crate::model::RobotState;

use super::{ModelStateSpace, PlanningState};

/// Low-dimensional summary of a state, used for planner heuristics.
pub trait ProjectionEvaluator: Send + Sync {
    fn dimensions(&self) -> usize;
    fn project(&self, state: &PlanningState, out: &mut [f64]);
}

/// Projection onto the world position of a link.
pub struct LinkPoseProjection {
    space: Arc<ModelStateSpace>,
    link: usize,
    reference: RobotState,
}

impl ProjectionEvaluator for LinkPoseProjection {
    fn dimensions(&self) -> usize {
        3
    }

    fn project(&self, state: &PlanningState, out: &mut [f64]) {
        let mut robot = self.reference.clone();
        self.space.copy_to_robot_state(&mut robot, state);
        let p = self.space.model().link_translation(&robot, self.link);
        out[..3].copy_from_slice(&p);
    }
}

/// Projection onto the concatenated values of selected joints.
pub struct JointValueProjection {
    /// Positions within the planning state, one per projected variable.
    positions: Vec<usize>,
}

impl ProjectionEvaluator for JointValueProjection {
    fn dimensions(&self) -> usize {
        self.positions.len()
    }

    fn project(&self, state: &PlanningState, out: &mut [f64]) {
        for (o, &p) in out.iter_mut().zip(self.positions.iter()) {
            *o = state.values[p];
        }
    }
}

/// Parsed form of a projection expression.
#[derive(Clone, Debug, PartialEq, Eq)]
enum ProjectionExpr {
    LinkPose(String),
    Joints(Vec<String>),
}

fn parse_expression(expr: &str) -> Result<ProjectionExpr> {
    if let Some(inner) = expr.strip_prefix("link(").and_then(|r| r.strip_suffix(')')) {
        return Ok(ProjectionExpr::LinkPose(inner.trim().to_string()));
    }
    if let Some(inner) = expr.strip_prefix("joints(").and_then(|r| r.strip_suffix(')')) {
        let names = inner
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        return Ok(ProjectionExpr::Joints(names));
    }
    Err(PlanError::BadProjectionExpression(expr.to_string()))
}

/// Resolve a projection expression against a state space.
///
/// Unknown joints are skipped with a logged error and zero-dof joints
/// with a warning; the expression fails only when no projected variable
/// remains. An unknown link fails outright.
pub fn resolve_projection(
    space: &Arc<ModelStateSpace>,
    reference: &RobotState,
    expr: &str,
) -> Result<Arc<dyn ProjectionEvaluator>> {
    match parse_expression(expr)? {
        ProjectionExpr::LinkPose(link_name) => {
            let link = space
                .model()
                .link_index(&link_name)
                .ok_or(PlanError::UnknownLink(link_name))?;
            Ok(Arc::new(LinkPoseProjection {
                space: Arc::clone(space),
                link,
                reference: reference.clone(),
            }))
        }
        ProjectionExpr::Joints(names) => {
            let model = space.model();
            let mut positions = Vec::new();
            for name in &names {
                let joint = match model.joint_index(name) {
                    Some(j) if space.group_local_offset(j).is_some() => j,
                    _ => {
                        error!(
                            "{}: attempted to project onto joint '{}', but that joint is not known to the group",
                            space.group_name(),
                            name
                        );
                        continue;
                    }
                };
                let dof = model.joint(joint).kind.dof();
                if dof == 0 {
                    warn!(
                        "{}: ignoring joint '{}' in projection since it has 0 DOF",
                        space.group_name(),
                        name
                    );
                    continue;
                }
                let offset = space.group_local_offset(joint).unwrap();
                positions.extend(offset..offset + dof);
            }
            if positions.is_empty() {
                error!("{}: no valid joints specified for joint projection", space.group_name());
                return Err(PlanError::NoValidJoints);
            }
            Ok(Arc::new(JointValueProjection { positions }))
        }
    }
}
