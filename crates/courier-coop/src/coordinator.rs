//! The coordination driver for one side of the pair.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use courier_brain::{BeliefSet, CoopHandle};
use courier_proto::messages::WirePartitioning;
use courier_proto::{Actuator, AgentId, Envelope, Point};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::handshake::HandshakeState;

/// Serialize a partitioning for the wire (`"x,y"` keys, deterministic
/// order).
pub fn encode_partitioning(map: &HashMap<Point, AgentId>) -> WirePartitioning {
    map.iter().map(|(p, id)| (p.key(), id.clone())).collect()
}

/// Parse a wire partitioning; malformed keys are dropped.
pub fn decode_partitioning(wire: &WirePartitioning) -> HashMap<Point, AgentId> {
    wire.iter()
        .filter_map(|(key, id)| Point::from_key(key).map(|p| (p, id.clone())))
        .collect()
}

/// Runs discovery, the three-way handshake, and steady-state belief
/// exchange for this agent. Inbound peer messages are dispatched by the
/// driver through [`Coordinator::handle_message`]; the periodic
/// [`Coordinator::tick`] keeps hello broadcasts and partition updates
/// flowing.
pub struct Coordinator {
    team_key: String,
    beliefs: Arc<Mutex<BeliefSet>>,
    actuator: Arc<dyn Actuator>,
    my_id: Mutex<Option<AgentId>>,
    state: Mutex<HandshakeState>,
}

impl Coordinator {
    pub fn new(
        team_key: String,
        beliefs: Arc<Mutex<BeliefSet>>,
        actuator: Arc<dyn Actuator>,
    ) -> Self {
        Self {
            team_key,
            beliefs,
            actuator,
            my_id: Mutex::new(None),
            state: Mutex::new(HandshakeState::default()),
        }
    }

    /// Learn our own id from the first self update.
    pub fn set_identity(&self, id: AgentId) {
        let mut my_id = self.my_id.lock().expect("identity mutex poisoned");
        my_id.get_or_insert(id);
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.lock_state().clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock_state().session_id.clone()
    }

    pub fn handshake_complete(&self) -> bool {
        self.lock_state().complete
    }

    /// Forget the session, e.g. on disconnect.
    pub fn reset(&self) {
        self.lock_state().clear();
    }

    fn lock_state(&self) -> MutexGuard<'_, HandshakeState> {
        self.state.lock().expect("handshake mutex poisoned")
    }

    fn identity(&self) -> Option<AgentId> {
        self.my_id.lock().expect("identity mutex poisoned").clone()
    }

    fn now_ms(&self) -> u64 {
        self.beliefs.lock().expect("belief mutex poisoned").now_ms()
    }

    /// Periodic work: broadcast `hello` until the handshake completes, and
    /// refresh + re-broadcast the partitioning afterwards when we own it.
    pub async fn tick(&self) {
        let Some(me) = self.identity() else {
            return;
        };

        let (complete, initiated) = {
            let state = self.lock_state();
            (state.complete, state.initiated)
        };

        if !complete {
            let hello = Envelope::Hello {
                team_id: self.team_key.clone(),
                agent_id: me,
                timestamp: self.now_ms(),
            };
            if let Err(err) = self.actuator.shout(hello).await {
                warn!(%err, "hello broadcast failed");
            }
            return;
        }

        if initiated {
            {
                let mut beliefs = self.beliefs.lock().expect("belief mutex poisoned");
                beliefs.recompute_partitioning();
            }
            self.send_partitioning().await;
        }
    }

    /// Dispatch one inbound peer message. `reply` carries the ask
    /// continuation when the peer expects an answer.
    pub async fn handle_message(
        &self,
        from_id: &AgentId,
        envelope: Envelope,
        reply: Option<oneshot::Sender<Envelope>>,
    ) {
        match envelope {
            Envelope::Hello {
                team_id, agent_id, ..
            } => self.handle_hello(&team_id, &agent_id).await,
            Envelope::HandshakeInit {
                team_key,
                nonce,
                from,
            } => self.handle_init(&team_key, nonce, &from, reply),
            Envelope::HandshakeConfirm { session_id, from } => {
                self.handle_confirm(&session_id, &from)
            }
            // The ack only ever arrives as an answer to our ask.
            Envelope::HandshakeAck { .. } => {
                debug!(from = %from_id, "ignoring out-of-band handshake ack")
            }
            session_scoped => self.handle_session_scoped(from_id, session_scoped),
        }
    }

    async fn handle_hello(&self, team_id: &str, peer: &AgentId) {
        if team_id != self.team_key {
            return;
        }
        let Some(me) = self.identity() else {
            return;
        };
        if *peer == me {
            return;
        }

        {
            let mut state = self.lock_state();
            if state.complete || state.pending_nonce.is_some() {
                return;
            }
            state.teammate_id = Some(peer.clone());
            if me >= *peer {
                // The lower id initiates; we wait for its init.
                return;
            }
            state.pending_nonce = Some(Uuid::new_v4().as_u128() as u64);
        }

        self.initiate(me, peer.clone()).await;
    }

    async fn initiate(&self, me: AgentId, peer: AgentId) {
        let nonce = match self.lock_state().pending_nonce {
            Some(nonce) => nonce,
            None => return,
        };

        let init = Envelope::HandshakeInit {
            team_key: self.team_key.clone(),
            nonce,
            from: me.clone(),
        };
        let answer = match self.actuator.ask(&peer, init).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(%err, "handshake init failed");
                self.lock_state().pending_nonce = None;
                return;
            }
        };

        let Envelope::HandshakeAck {
            team_key,
            session_id,
            from,
            echo_nonce,
        } = answer
        else {
            warn!("unexpected answer to handshake init");
            self.lock_state().pending_nonce = None;
            return;
        };

        if team_key != self.team_key || echo_nonce != nonce || from != peer {
            warn!(peer = %peer, "handshake ack failed verification");
            self.lock_state().pending_nonce = None;
            return;
        }

        let confirm = Envelope::HandshakeConfirm {
            session_id: session_id.clone(),
            from: me,
        };
        if let Err(err) = self.actuator.say(&peer, confirm).await {
            warn!(%err, "handshake confirm failed");
            self.lock_state().pending_nonce = None;
            return;
        }

        {
            let mut state = self.lock_state();
            state.teammate_id = Some(peer.clone());
            state.session_id = Some(session_id.clone());
            state.complete = true;
            state.initiated = true;
            state.pending_nonce = None;
        }
        {
            let mut beliefs = self.beliefs.lock().expect("belief mutex poisoned");
            beliefs.set_teammate_id(peer.clone());
        }
        info!(teammate = %peer, session = %session_id, "handshake complete (initiator)");
    }

    fn handle_init(
        &self,
        team_key: &str,
        nonce: u64,
        from: &AgentId,
        reply: Option<oneshot::Sender<Envelope>>,
    ) {
        if team_key != self.team_key {
            warn!(peer = %from, "handshake init with wrong team key");
            return;
        }
        let Some(me) = self.identity() else {
            return;
        };
        let Some(reply) = reply else {
            warn!(peer = %from, "handshake init without a reply channel");
            return;
        };

        let session_id = Uuid::new_v4().to_string();
        {
            let mut state = self.lock_state();
            state.teammate_id = Some(from.clone());
            state.session_id = Some(session_id.clone());
            // Completion happens on the confirm.
            state.complete = false;
            state.initiated = false;
        }

        let ack = Envelope::HandshakeAck {
            team_key: self.team_key.clone(),
            session_id,
            from: me,
            echo_nonce: nonce,
        };
        if reply.send(ack).is_err() {
            warn!(peer = %from, "handshake ack could not be delivered");
        }
    }

    fn handle_confirm(&self, session_id: &str, from: &AgentId) {
        let teammate = {
            let mut state = self.lock_state();
            if state.session_id.as_deref() != Some(session_id) {
                warn!(peer = %from, "confirm for an unknown session");
                return;
            }
            state.complete = true;
            state.initiated = false;
            state.teammate_id.clone()
        };
        if let Some(teammate) = teammate {
            let mut beliefs = self.beliefs.lock().expect("belief mutex poisoned");
            beliefs.set_teammate_id(teammate);
        }
        info!(peer = %from, session = %session_id, "handshake complete (responder)");
    }

    /// Merge a session-scoped message through the same belief update paths
    /// as local sensing. Messages from a stale session are discarded.
    fn handle_session_scoped(&self, from_id: &AgentId, envelope: Envelope) {
        {
            let state = self.lock_state();
            if !state.complete
                || envelope.session_id() != state.session_id.as_deref()
            {
                warn!(from = %from_id, "discarding message with stale session");
                return;
            }
        }

        let mut beliefs = self.beliefs.lock().expect("belief mutex poisoned");
        match envelope {
            Envelope::ParcelsSensed { parcels, .. } => beliefs.update_from_parcels(parcels),
            Envelope::AgentsSensed { agents, .. } => beliefs.update_from_agents(agents),
            Envelope::MyInfo { info, .. } => beliefs.set_teammate(info),
            Envelope::MapPartitioning { partitioning, .. } => {
                beliefs.set_partitioning(decode_partitioning(&partitioning));
            }
            _ => {}
        }
    }

    // --- outbound sharing ---------------------------------------------------

    async fn send_to_teammate(&self, build: impl FnOnce(String) -> Envelope) {
        let (teammate, session) = {
            let state = self.lock_state();
            if !state.complete {
                return;
            }
            match (state.teammate_id.clone(), state.session_id.clone()) {
                (Some(teammate), Some(session)) => (teammate, session),
                _ => return,
            }
        };
        if let Err(err) = self.actuator.say(&teammate, build(session)).await {
            warn!(%err, "teammate message failed");
        }
    }

    /// Forward locally sensed parcels.
    pub async fn share_parcels(&self, parcels: Vec<courier_proto::Parcel>) {
        self.send_to_teammate(|session_id| Envelope::ParcelsSensed {
            session_id,
            parcels,
        })
        .await;
    }

    /// Forward locally sensed agents.
    pub async fn share_agents(&self, agents: Vec<courier_proto::Agent>) {
        self.send_to_teammate(|session_id| Envelope::AgentsSensed { session_id, agents })
            .await;
    }

    /// Forward our own state so the teammate can partition against it.
    pub async fn share_my_info(&self, info: courier_proto::Agent) {
        self.send_to_teammate(|session_id| Envelope::MyInfo { session_id, info })
            .await;
    }

    async fn send_partitioning(&self) {
        let Some(wire) = ({
            let beliefs = self.beliefs.lock().expect("belief mutex poisoned");
            beliefs.partitioning().map(encode_partitioning)
        }) else {
            return;
        };
        self.send_to_teammate(|session_id| Envelope::MapPartitioning {
            session_id,
            partitioning: wire,
        })
        .await;
    }
}

#[async_trait]
impl CoopHandle for Coordinator {
    fn owns_partitioning(&self) -> bool {
        let state = self.lock_state();
        state.complete && state.initiated
    }

    async fn broadcast_partitioning(&self) {
        self.send_partitioning().await;
    }
}
