//! Carry the current load to a delivery zone and drop it.

use async_trait::async_trait;
use courier_proto::ActuatorError;
use tracing::info;

use crate::context::AgentContext;
use crate::desire::{Desire, DesireKind, Predicate};
use crate::error::{PlanError, PlanResult};
use crate::intention::{Intention, StopToken};
use crate::plans::{refresh_partitioning, Plan};

pub struct DeliverPlan {
    stop: StopToken,
}

impl DeliverPlan {
    pub fn applicable(kind: DesireKind) -> bool {
        matches!(kind, DesireKind::Deliver)
    }

    pub fn new(stop: StopToken) -> Self {
        Self { stop }
    }
}

#[async_trait]
impl Plan for DeliverPlan {
    async fn execute(&mut self, predicate: &Predicate, ctx: &AgentContext) -> PlanResult<bool> {
        {
            let beliefs = ctx.lock_beliefs();
            if beliefs.carried_count() == 0 {
                return Err(PlanError::StateMismatch("nothing to deliver"));
            }
        }

        let mut approach = Intention::with_token(
            Predicate::new(
                Desire::GoTo {
                    destination: predicate.desire.destination(),
                },
                predicate.utility,
            ),
            self.stop.child(),
        );
        approach.achieve(ctx).await?;

        if self.stop.is_stopped() {
            return Err(PlanError::Stopped);
        }

        let dropped = match ctx.actuator.drop_parcels().await {
            Ok(parcels) => parcels,
            Err(ActuatorError::Transport(reason)) => return Err(PlanError::Transport(reason)),
            Err(ActuatorError::MoveRefused) => return Err(PlanError::StateMismatch("drop refused")),
        };

        if !dropped.is_empty() {
            {
                let mut beliefs = ctx.lock_beliefs();
                beliefs.clear_carrying_parcels();
            }
            info!(count = dropped.len(), "delivered parcels");
            refresh_partitioning(ctx).await;
        }
        Ok(true)
    }

    fn stop(&mut self) {
        self.stop.stop();
    }
}
