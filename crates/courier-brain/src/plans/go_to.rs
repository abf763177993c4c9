//! Walk to a destination along an A* path.

use async_trait::async_trait;
use courier_nav::find_path;
use courier_proto::ActuatorError;

use crate::context::AgentContext;
use crate::desire::{DesireKind, Predicate};
use crate::error::{PlanError, PlanResult};
use crate::intention::StopToken;
use crate::plans::Plan;

pub struct GoToPlan {
    stop: StopToken,
}

impl GoToPlan {
    pub fn applicable(kind: DesireKind) -> bool {
        matches!(kind, DesireKind::GoTo | DesireKind::Exploration)
    }

    pub fn new(stop: StopToken) -> Self {
        Self { stop }
    }
}

#[async_trait]
impl Plan for GoToPlan {
    async fn execute(&mut self, predicate: &Predicate, ctx: &AgentContext) -> PlanResult<bool> {
        if self.stop.is_stopped() {
            return Err(PlanError::Stopped);
        }
        let destination = predicate.desire.destination();

        let (grid, blocked, start) = {
            let beliefs = ctx.lock_beliefs();
            let grid = beliefs
                .grid()
                .cloned()
                .ok_or(PlanError::StateMismatch("map not loaded yet"))?;
            let start = beliefs
                .my_tile()
                .ok_or(PlanError::StateMismatch("own position unknown"))?;
            (grid, beliefs.occupied_positions(), start)
        };

        let path = find_path(&grid, &blocked, start, destination).ok_or(
            PlanError::PathNotFound {
                from: start,
                to: destination,
            },
        )?;

        let mut at = start;
        for direction in path.moves {
            if self.stop.is_stopped() {
                return Err(PlanError::Stopped);
            }
            match ctx.actuator.step(direction).await {
                Ok(position) => at = position,
                Err(ActuatorError::MoveRefused) => return Err(PlanError::MoveFailed { at }),
                Err(ActuatorError::Transport(reason)) => return Err(PlanError::Transport(reason)),
            }
        }
        Ok(true)
    }

    fn stop(&mut self) {
        self.stop.stop();
    }
}
