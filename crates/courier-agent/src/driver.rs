//! Wires sensor events into belief updates and deliberation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use courier_brain::{
    run_intention_loop, AgentContext, BeliefSet, IntentionQueue, OptionGenerator, SystemClock,
};
use courier_coop::Coordinator;
use courier_proto::{Actuator, AgentConfig, SensorEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How often the coordinator's periodic work (hello broadcasts, partition
/// refresh) runs.
const COOP_TICK_MS: u64 = 1_000;

/// The agent driver: consumes the sensor stream, keeps the belief set
/// fresh, re-deliberates after every relevant event, and hosts the
/// intention loop and the coordinator tick as cooperative tasks.
pub struct Driver {
    ctx: AgentContext,
    queue: Arc<Mutex<IntentionQueue>>,
    options: OptionGenerator,
    coordinator: Option<Arc<Coordinator>>,
    events: mpsc::UnboundedReceiver<SensorEvent>,
}

impl Driver {
    pub fn new(
        config: AgentConfig,
        actuator: Arc<dyn Actuator>,
        events: mpsc::UnboundedReceiver<SensorEvent>,
    ) -> Self {
        let beliefs = Arc::new(Mutex::new(BeliefSet::new(Arc::new(SystemClock))));
        let options = OptionGenerator::new(&config);

        let coordinator = match (&config.team_key, config.cooperative()) {
            (Some(team_key), true) => Some(Arc::new(Coordinator::new(
                team_key.clone(),
                beliefs.clone(),
                actuator.clone(),
            ))),
            (None, true) => {
                warn!("co-op mode without a team key; running solo");
                None
            }
            _ => None,
        };

        let mut ctx = AgentContext::new(beliefs, actuator, Arc::new(config));
        if let Some(coordinator) = &coordinator {
            ctx = ctx.with_coop(coordinator.clone());
        }

        Self {
            ctx,
            queue: Arc::new(Mutex::new(IntentionQueue::new())),
            options,
            coordinator,
            events,
        }
    }

    /// The shared context, mainly for inspection in tests.
    pub fn context(&self) -> AgentContext {
        self.ctx.clone()
    }

    /// Run until the sensor stream disconnects.
    pub async fn run(mut self) -> Result<()> {
        let (wake_tx, mut wake_rx) = mpsc::unbounded_channel();

        let intention_task = tokio::spawn(run_intention_loop(
            self.ctx.clone(),
            self.queue.clone(),
            wake_tx,
        ));
        let coop_task = self.coordinator.clone().map(|coordinator| {
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(Duration::from_millis(COOP_TICK_MS));
                loop {
                    tick.tick().await;
                    coordinator.tick().await;
                }
            })
        });

        let mut status = tokio::time::interval(Duration::from_millis(
            self.ctx.config.log_interval_ms.max(1),
        ));

        loop {
            tokio::select! {
                biased;

                event = self.events.recv() => {
                    match event {
                        None => {
                            info!("sensor stream closed");
                            break;
                        }
                        Some(SensorEvent::Disconnect) => {
                            info!("disconnected");
                            break;
                        }
                        Some(event) => self.handle_event(event).await,
                    }
                }

                _ = wake_rx.recv() => {
                    // The intention queue drained: re-deliberate right away.
                    self.deliberate();
                }

                _ = status.tick() => {
                    self.log_status();
                }
            }
        }

        if let Some(coordinator) = &self.coordinator {
            coordinator.reset();
        }
        self.ctx.lock_beliefs().clear_session();
        intention_task.abort();
        if let Some(task) = coop_task {
            task.abort();
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::Connect => info!("connected"),
            SensorEvent::Disconnect => unreachable!("handled by the run loop"),

            SensorEvent::Config(config) => {
                debug!(?config, "game config received");
                self.ctx.lock_beliefs().update_from_config(config);
            }

            SensorEvent::You(agent) => {
                if let Some(coordinator) = &self.coordinator {
                    coordinator.set_identity(agent.id.clone());
                }
                self.ctx.lock_beliefs().update_from_you(agent.clone());
                if let Some(coordinator) = &self.coordinator {
                    coordinator.share_my_info(agent).await;
                }
                self.deliberate();
            }

            SensorEvent::Map {
                width,
                height,
                tiles,
            } => {
                self.ctx.lock_beliefs().update_from_map(width, height, &tiles);
                self.deliberate();
            }

            SensorEvent::Parcels(parcels) => {
                self.ctx.lock_beliefs().update_from_parcels(parcels.clone());
                if let Some(coordinator) = &self.coordinator {
                    coordinator.share_parcels(parcels).await;
                }
                self.deliberate();
            }

            SensorEvent::Agents(agents) => {
                self.ctx.lock_beliefs().update_from_agents(agents.clone());
                if let Some(coordinator) = &self.coordinator {
                    coordinator.share_agents(agents).await;
                }
                self.deliberate();
            }

            SensorEvent::Msg {
                from_id,
                envelope,
                reply,
                ..
            } => {
                if let Some(coordinator) = &self.coordinator {
                    coordinator.handle_message(&from_id, envelope, reply).await;
                    self.deliberate();
                } else {
                    debug!(from = %from_id, "peer message in single-agent mode, ignored");
                }
            }
        }
    }

    /// Score the options against the current commitment and push any winner.
    fn deliberate(&mut self) {
        let current = {
            let queue = self.queue.lock().expect("intention queue poisoned");
            queue.effective_commitment()
        };
        let option = {
            let mut beliefs = self.ctx.lock_beliefs();
            self.options.best_option(&mut beliefs, current.as_ref())
        };
        if let Some(predicate) = option {
            let mut queue = self.queue.lock().expect("intention queue poisoned");
            queue.push(predicate);
        }
    }

    fn log_status(&self) {
        let mut beliefs = self.ctx.lock_beliefs();
        let position = beliefs.my_tile();
        let carrying = beliefs.carried_count();
        let carried_reward = beliefs.carried_reward();
        let parcels = beliefs.parcels().len();
        info!(?position, carrying, carried_reward, parcels, "status");
    }
}
