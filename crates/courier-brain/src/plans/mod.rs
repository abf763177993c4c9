//! The plan library: pluggable executors keyed by desire kind.

use async_trait::async_trait;

use crate::context::AgentContext;
use crate::desire::{DesireKind, Predicate};
use crate::error::PlanResult;
use crate::intention::StopToken;

mod deliver;
mod go_to;
mod pick_up;

pub use deliver::DeliverPlan;
pub use go_to::GoToPlan;
pub use pick_up::PickUpPlan;

/// One executable strategy for a committed predicate.
#[async_trait]
pub trait Plan: Send {
    async fn execute(&mut self, predicate: &Predicate, ctx: &AgentContext) -> PlanResult<bool>;

    /// Request cooperative cancellation; observed at the next yield point.
    fn stop(&mut self);
}

/// A library row: applicability test plus constructor.
pub struct PlanEntry {
    pub name: &'static str,
    pub applicable: fn(DesireKind) -> bool,
    pub build: fn(StopToken) -> Box<dyn Plan>,
}

/// Ordered plan registry walked by [`crate::Intention::achieve`].
pub struct PlanLibrary {
    entries: Vec<PlanEntry>,
}

impl PlanLibrary {
    /// The standard library: go-to (also serving exploration), pickup,
    /// deliver.
    pub fn standard() -> Self {
        Self {
            entries: vec![
                PlanEntry {
                    name: "go_to",
                    applicable: GoToPlan::applicable,
                    build: |stop| Box::new(GoToPlan::new(stop)),
                },
                PlanEntry {
                    name: "pick_up",
                    applicable: PickUpPlan::applicable,
                    build: |stop| Box::new(PickUpPlan::new(stop)),
                },
                PlanEntry {
                    name: "deliver",
                    applicable: DeliverPlan::applicable,
                    build: |stop| Box::new(DeliverPlan::new(stop)),
                },
            ],
        }
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }
}

impl Default for PlanLibrary {
    fn default() -> Self {
        Self::standard()
    }
}

/// After a successful pickup or delivery the partition owner refreshes the
/// generator assignment and pushes it to the teammate.
pub(crate) async fn refresh_partitioning(ctx: &AgentContext) {
    let Some(coop) = ctx.coop.as_ref() else {
        return;
    };
    if !coop.owns_partitioning() {
        return;
    }
    let changed = { ctx.lock_beliefs().recompute_partitioning() };
    if changed {
        coop.broadcast_partitioning().await;
    }
}
