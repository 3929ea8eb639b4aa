//! Error taxonomy of the engine.
//!
//! Structural errors reject a command and leave the pipeline untouched.
//! Execution errors never leave a pass; they are routed through the
//! exception witness. Internal errors mean an invariant was broken and abort
//! the pass.

use crate::core::id::{ConnectionId, Direction, SocketId, StepId};
use crate::core::value::ValueType;
use thiserror::Error;

/// A command was rejected. Nothing was changed and no event was emitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralError {
    #[error("Cannot connect {source_type} output to {target_type} input")]
    TypeMismatch {
        source_type: ValueType,
        target_type: ValueType,
    },

    #[error("Input {0} already has an incoming connection")]
    AlreadyConnected(SocketId),

    #[error("Connecting {from} to {to} would create a cycle")]
    Cycle { from: StepId, to: StepId },

    #[error("Unknown step: {0}")]
    UnknownStep(StepId),

    #[error("Unknown socket: {0}")]
    UnknownSocket(SocketId),

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Socket {socket} is not an {expected} socket")]
    DirectionMismatch {
        socket: SocketId,
        expected: Direction,
    },

    #[error("Input {0} is fed by a connection and cannot be set directly")]
    SocketBound(SocketId),

    #[error("Value of type {actual} cannot be stored in {expected} socket")]
    InvalidValue {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Index {index} is out of bounds for {len} steps")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Failure raised by an operation while performing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("Invalid input '{name}': {reason}")]
    InvalidInput { name: String, reason: String },

    #[error("Operation returned {actual} outputs, expected {expected}")]
    OutputCount { expected: usize, actual: usize },

    #[error("Output '{name}' expects {expected}, got {actual}")]
    OutputType {
        name: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Operation panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl OperationError {
    pub fn failed(message: impl Into<String>) -> Self {
        OperationError::Failed(message.into())
    }

    pub fn invalid_input(name: impl Into<String>, reason: impl Into<String>) -> Self {
        OperationError::InvalidInput {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single step execution. Contained by the pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Required input '{name}' has no value")]
    MissingInput { name: String, index: usize },

    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// A broken invariant detected during a pass. Indicates a bug in edit
/// validation, not a recoverable condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InternalError {
    #[error("Cycle reached the scheduler; steps left pending: {0:?}")]
    CycleDetected(Vec<StepId>),

    #[error("Connection {connection} references missing step {step}")]
    OrphanedConnection {
        connection: ConnectionId,
        step: StepId,
    },

    #[error("Pass executed {executed} steps but the pipeline only has {limit}")]
    FrontierOverrun { executed: usize, limit: usize },
}

pub type StructuralResult<T> = std::result::Result<T, StructuralError>;
