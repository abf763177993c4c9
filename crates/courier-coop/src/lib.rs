//! Two-agent coordination: discovery, handshake, and session-scoped
//! belief exchange.

#![forbid(unsafe_code)]

pub mod coordinator;
pub mod handshake;

pub use coordinator::{decode_partitioning, encode_partitioning, Coordinator};
pub use handshake::HandshakeState;
