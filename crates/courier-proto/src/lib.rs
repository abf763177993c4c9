//! Shared data model and I/O contracts for the courier agents.
//!
//! This crate defines the shapes the decision core is driven by (sensor
//! events), the shapes it acts through (the actuator), and the wire messages
//! two cooperating agents exchange. It deliberately contains no transport:
//! the simulator client is an external collaborator that feeds
//! [`SensorEvent`]s into a channel and implements [`Actuator`].

#![forbid(unsafe_code)]

pub mod config;
pub mod io;
pub mod messages;
pub mod types;

pub use config::{AgentConfig, AgentMode, ConfigError, GameConfig, Interval, LogLevel};
pub use io::{Actuator, ActuatorError, MapTile, SensorEvent};
pub use messages::Envelope;
pub use types::{Agent, AgentId, Direction, Parcel, ParcelId, Point};
