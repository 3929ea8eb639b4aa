//! Identity types for steps, sockets and connections.
//!
//! Steps and connections are held in owning collections on the
//! [`Pipeline`](crate::core::Pipeline); everything else refers to them through
//! these copyable handles. Identifiers are never reused within a pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle of a step inside one pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub u64);

impl fmt::Debug for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepId({})", self.0)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step#{}", self.0)
    }
}

/// Whether a socket consumes or produces values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// Address of a socket: owning step, direction and position in that step's
/// ordered socket list.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketId {
    pub step: StepId,
    pub direction: Direction,
    pub index: usize,
}

impl SocketId {
    pub fn input(step: StepId, index: usize) -> Self {
        Self {
            step,
            direction: Direction::Input,
            index,
        }
    }

    pub fn output(step: StepId, index: usize) -> Self {
        Self {
            step,
            direction: Direction::Output,
            index,
        }
    }

    #[inline]
    pub fn is_input(self) -> bool {
        self.direction == Direction::Input
    }

    #[inline]
    pub fn is_output(self) -> bool {
        self.direction == Direction::Output
    }
}

impl fmt::Debug for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SocketId({}, {}[{}])",
            self.step.0, self.direction, self.index
        )
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.step, self.direction, self.index)
    }
}

/// Stable handle of a connection inside one pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}
