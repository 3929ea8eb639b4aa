//! Core domain models for the dataflow engine
//!
//! Values flow through sockets owned by steps. Connections link an output
//! socket to an input socket, and the pipeline owns all of them.

pub mod config;
pub mod connection;
pub mod error;
pub mod id;
pub mod operation;
pub mod pipeline;
pub mod socket;
pub mod state;
pub mod step;
pub mod value;
pub mod witness;

pub use connection::Connection;
pub use error::{ExecutionError, InternalError, OperationError, StructuralError};
pub use id::{ConnectionId, Direction, SocketId, StepId};
pub use operation::{Operation, OperationDescription, OperationInputs};
pub use pipeline::*;
pub use socket::{Socket, SocketHint};
pub use state::*;
pub use step::*;
pub use value::{Image, Value, ValueType};
