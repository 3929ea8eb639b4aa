//! visionflow - an incremental dataflow engine for vision processing

pub mod cli;
pub mod core;
pub mod event;
pub mod execution;
pub mod operations;

// Re-export commonly used types
pub use crate::core::config::{GraphConfig, PipelineSettings};
pub use crate::core::{Pipeline, PassReport, PassTrigger, SocketId, Step, StepId, StepStatus, Value};
pub use event::{EventBus, PipelineEvent};
pub use execution::PipelineHandle;
pub use operations::OperationRegistry;
