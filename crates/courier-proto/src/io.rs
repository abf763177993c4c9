//! Sensor and actuator contracts.
//!
//! The transport layer (external to this workspace) turns socket traffic into
//! [`SensorEvent`]s pushed down a channel, and implements [`Actuator`] by
//! issuing the corresponding simulator commands.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::config::GameConfig;
use crate::messages::Envelope;
use crate::types::{Agent, AgentId, Direction, Parcel, Point};

/// A raw map tile as announced by `onMap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapTile {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: u8,
}

/// One sensor callback, reified as an event.
#[derive(Debug)]
pub enum SensorEvent {
    Connect,
    Disconnect,
    /// Once per session.
    Config(GameConfig),
    /// Self update; position may be fractional while moving.
    You(Agent),
    /// Once after connect.
    Map {
        width: u32,
        height: u32,
        tiles: Vec<MapTile>,
    },
    /// Periodic sensing within the observation radius.
    Parcels(Vec<Parcel>),
    Agents(Vec<Agent>),
    /// Inbound peer message. `reply` is the continuation for ask/answer
    /// round-trips; fire-and-forget messages carry `None`.
    Msg {
        from_id: AgentId,
        from_name: String,
        envelope: Envelope,
        reply: Option<oneshot::Sender<Envelope>>,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActuatorError {
    /// The simulator refused the move (e.g. the tile was taken mid-step).
    #[error("move refused by the simulator")]
    MoveRefused,

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Commands the core can issue against the simulator.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Perform one primitive move; resolves to the new position.
    async fn step(&self, direction: Direction) -> Result<Point, ActuatorError>;

    /// Pick up whatever parcels share the agent's tile; resolves to the
    /// affected parcels.
    async fn pickup(&self) -> Result<Vec<Parcel>, ActuatorError>;

    /// Drop every carried parcel; resolves to the affected parcels.
    async fn drop_parcels(&self) -> Result<Vec<Parcel>, ActuatorError>;

    /// Direct message to one agent.
    async fn say(&self, to: &AgentId, envelope: Envelope) -> Result<(), ActuatorError>;

    /// Broadcast to every agent in range.
    async fn shout(&self, envelope: Envelope) -> Result<(), ActuatorError>;

    /// Request/response round-trip, bounded by the transport's timeout.
    async fn ask(&self, to: &AgentId, envelope: Envelope) -> Result<Envelope, ActuatorError>;
}
