//! Connection domain model

use crate::core::id::{ConnectionId, SocketId, StepId};
use serde::{Deserialize, Serialize};

/// Directed edge from one output socket to one input socket.
///
/// Connections refer to their endpoints by identifier; the pipeline owns
/// both the connection and the steps holding the sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,

    /// Output socket the value is read from
    pub from: SocketId,

    /// Input socket the value is written to
    pub to: SocketId,
}

impl Connection {
    pub fn upstream_step(&self) -> StepId {
        self.from.step
    }

    pub fn downstream_step(&self) -> StepId {
        self.to.step
    }

    /// Whether either endpoint belongs to `step`.
    pub fn touches(&self, step: StepId) -> bool {
        self.from.step == step || self.to.step == step
    }
}
