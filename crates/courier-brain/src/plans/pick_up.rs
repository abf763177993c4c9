//! Reach a parcel and pick it up.

use async_trait::async_trait;
use courier_proto::ActuatorError;
use tracing::info;

use crate::context::AgentContext;
use crate::desire::{Desire, DesireKind, Predicate};
use crate::error::{PlanError, PlanResult};
use crate::intention::{Intention, StopToken};
use crate::plans::{refresh_partitioning, Plan};

pub struct PickUpPlan {
    stop: StopToken,
}

impl PickUpPlan {
    pub fn applicable(kind: DesireKind) -> bool {
        matches!(kind, DesireKind::Pickup)
    }

    pub fn new(stop: StopToken) -> Self {
        Self { stop }
    }
}

#[async_trait]
impl Plan for PickUpPlan {
    async fn execute(&mut self, predicate: &Predicate, ctx: &AgentContext) -> PlanResult<bool> {
        let Desire::Pickup {
            parcel_id,
            destination,
        } = &predicate.desire
        else {
            return Err(PlanError::StateMismatch("pickup plan on a non-pickup goal"));
        };

        {
            let mut beliefs = ctx.lock_beliefs();
            match beliefs.parcel(parcel_id) {
                Some(p) if p.parcel.carried_by.is_none() => {}
                _ => return Err(PlanError::StateMismatch("target parcel gone or carried")),
            }
        }

        let mut approach = Intention::with_token(
            Predicate::new(
                Desire::GoTo {
                    destination: *destination,
                },
                predicate.utility,
            ),
            self.stop.child(),
        );
        approach.achieve(ctx).await?;

        if self.stop.is_stopped() {
            return Err(PlanError::Stopped);
        }

        let picked = match ctx.actuator.pickup().await {
            Ok(parcels) => parcels,
            Err(ActuatorError::Transport(reason)) => return Err(PlanError::Transport(reason)),
            Err(ActuatorError::MoveRefused) => {
                return Err(PlanError::StateMismatch("pickup refused"))
            }
        };

        if !picked.is_empty() {
            {
                let mut beliefs = ctx.lock_beliefs();
                for parcel in &picked {
                    beliefs.add_carrying_parcel(parcel.clone());
                }
            }
            info!(count = picked.len(), "picked up parcels");
            refresh_partitioning(ctx).await;
        }
        Ok(true)
    }

    fn stop(&mut self) {
        self.stop.stop();
    }
}
