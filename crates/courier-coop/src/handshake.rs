//! Handshake bookkeeping.

use courier_proto::AgentId;

/// Where the pair stands in the three-way handshake.
///
/// The lexicographically lower agent id initiates; the responder mints the
/// session id. Once `complete`, every cooperative message carries the
/// session id and only the `initiated` side recomputes and broadcasts the
/// partitioning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeState {
    pub teammate_id: Option<AgentId>,
    pub session_id: Option<String>,
    pub complete: bool,
    pub initiated: bool,
    /// Nonce sent with our `handshake_init`, awaiting its echo.
    pub pending_nonce: Option<u64>,
}

impl HandshakeState {
    /// Forget everything, e.g. on disconnect.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
