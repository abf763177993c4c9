//! Wire messages exchanged between cooperating agents.
//!
//! Every message travels as a `{"type": ..., "content": ...}` envelope.
//! Handshake messages establish a session id; steady-state messages carry it
//! and are discarded by receivers whose session differs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Agent, AgentId, Parcel};

/// Partitioning on the wire: `"x,y"` tile key to owning agent id.
pub type WirePartitioning = BTreeMap<String, AgentId>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Envelope {
    /// Periodic discovery broadcast, sent until the handshake completes.
    Hello {
        team_id: String,
        agent_id: AgentId,
        timestamp: u64,
    },
    /// Step 1 of the handshake, sent by the lexicographically lower id.
    HandshakeInit {
        team_key: String,
        nonce: u64,
        from: AgentId,
    },
    /// Step 2: the responder mints a fresh session and echoes the nonce.
    HandshakeAck {
        team_key: String,
        session_id: String,
        from: AgentId,
        echo_nonce: u64,
    },
    /// Step 3: the initiator confirms the session.
    HandshakeConfirm { session_id: String, from: AgentId },
    ParcelsSensed {
        session_id: String,
        parcels: Vec<Parcel>,
    },
    AgentsSensed {
        session_id: String,
        agents: Vec<Agent>,
    },
    MyInfo { session_id: String, info: Agent },
    MapPartitioning {
        session_id: String,
        partitioning: WirePartitioning,
    },
}

impl Envelope {
    /// The session tag on session-scoped messages, `None` on handshake
    /// traffic.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Envelope::Hello { .. }
            | Envelope::HandshakeInit { .. }
            | Envelope::HandshakeAck { .. }
            | Envelope::HandshakeConfirm { .. } => None,
            Envelope::ParcelsSensed { session_id, .. }
            | Envelope::AgentsSensed { session_id, .. }
            | Envelope::MyInfo { session_id, .. }
            | Envelope::MapPartitioning { session_id, .. } => Some(session_id),
        }
    }
}
