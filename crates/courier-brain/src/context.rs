//! The explicit context threaded through deliberation and execution.
//!
//! Nothing in this workspace is a global: every component receives the
//! belief set, the actuator, and the configuration through this handle.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use courier_proto::{Actuator, AgentConfig};

use crate::beliefs::BeliefSet;
use crate::plans::PlanLibrary;

/// Hook into the coordination layer, implemented by the cooperating
/// coordinator. Kept as a trait here so plans can trigger partition
/// re-broadcasts without the brain depending on the comms crate.
#[async_trait]
pub trait CoopHandle: Send + Sync {
    /// True when this agent won the handshake initiative and therefore owns
    /// partition recomputation.
    fn owns_partitioning(&self) -> bool;

    /// Push the belief set's current partitioning to the teammate.
    async fn broadcast_partitioning(&self);
}

#[derive(Clone)]
pub struct AgentContext {
    pub beliefs: Arc<Mutex<BeliefSet>>,
    pub actuator: Arc<dyn Actuator>,
    pub config: Arc<AgentConfig>,
    pub plans: Arc<PlanLibrary>,
    pub coop: Option<Arc<dyn CoopHandle>>,
}

impl AgentContext {
    pub fn new(
        beliefs: Arc<Mutex<BeliefSet>>,
        actuator: Arc<dyn Actuator>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self {
            beliefs,
            actuator,
            config,
            plans: Arc::new(PlanLibrary::standard()),
            coop: None,
        }
    }

    pub fn with_coop(mut self, coop: Arc<dyn CoopHandle>) -> Self {
        self.coop = Some(coop);
        self
    }

    /// Beliefs are only ever locked between suspension points; the guard
    /// must not be held across an `await`.
    pub fn lock_beliefs(&self) -> MutexGuard<'_, BeliefSet> {
        self.beliefs.lock().expect("belief mutex poisoned")
    }
}
