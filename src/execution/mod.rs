//! Pipeline execution: the pass scheduler and shared access to a pipeline

pub mod engine;
pub mod scheduler;

pub use engine::PipelineHandle;
pub use scheduler::run_pass;
