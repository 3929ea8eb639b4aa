//! Events published by the pipeline
//!
//! Every successful command publishes exactly one structural event. Passes
//! publish socket changes, exception reports and lifecycle markers.
//! Collaborators (a UI, a recorder) subscribe through the [`EventBus`].

pub mod bus;

pub use bus::{EventBus, EventSubscriber, Lagged, DEFAULT_EVENT_CAPACITY};

use crate::core::{
    connection::Connection,
    error::{ExecutionError, InternalError},
    id::{SocketId, StepId},
    state::PassReport,
    value::Value,
};
use uuid::Uuid;

/// Events that can occur on a pipeline
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A step was inserted. `index` is `None` when it was appended.
    StepAdded {
        step: StepId,
        operation: String,
        index: Option<usize>,
    },
    StepRemoved {
        step: StepId,
    },
    StepMoved {
        step: StepId,
        from_index: usize,
        to_index: usize,
    },
    StepEnabledChanged {
        step: StepId,
        enabled: bool,
    },
    ConnectionAdded {
        connection: Connection,
    },
    ConnectionRemoved {
        connection: Connection,
    },
    /// The stored value of a socket changed. `None` means it became unset.
    SocketChanged {
        socket: SocketId,
        value: Option<Value>,
    },
    /// A step failed. Listeners route on `origin`.
    Exception {
        origin: StepId,
        message: String,
        error: Option<ExecutionError>,
    },
    /// A step that previously failed succeeded or was removed.
    ExceptionCleared {
        origin: StepId,
    },
    PassStarted {
        pass_id: Uuid,
        generation: u64,
    },
    PassCompleted {
        report: PassReport,
    },
    /// A pass stopped on a broken invariant. Closes its `PassStarted`.
    PassAborted {
        pass_id: Uuid,
        error: InternalError,
    },
}

impl PipelineEvent {
    /// Step the event is about, when there is exactly one.
    pub fn origin(&self) -> Option<StepId> {
        match self {
            PipelineEvent::StepAdded { step, .. }
            | PipelineEvent::StepRemoved { step }
            | PipelineEvent::StepMoved { step, .. }
            | PipelineEvent::StepEnabledChanged { step, .. } => Some(*step),
            PipelineEvent::SocketChanged { socket, .. } => Some(socket.step),
            PipelineEvent::Exception { origin, .. } | PipelineEvent::ExceptionCleared { origin } => {
                Some(*origin)
            }
            PipelineEvent::ConnectionAdded { .. }
            | PipelineEvent::ConnectionRemoved { .. }
            | PipelineEvent::PassStarted { .. }
            | PipelineEvent::PassCompleted { .. }
            | PipelineEvent::PassAborted { .. } => None,
        }
    }

    /// Whether the event reflects an edit of the graph structure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PipelineEvent::StepAdded { .. }
                | PipelineEvent::StepRemoved { .. }
                | PipelineEvent::StepMoved { .. }
                | PipelineEvent::StepEnabledChanged { .. }
                | PipelineEvent::ConnectionAdded { .. }
                | PipelineEvent::ConnectionRemoved { .. }
        )
    }
}
