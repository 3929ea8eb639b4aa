//! Serialized, shareable access to a pipeline
//!
//! Edits may come from any task or thread (typically a UI), while passes must
//! observe a consistent graph. [`PipelineHandle`] puts the pipeline behind a
//! single async lock: every command and every pass takes it, so an edit is
//! applied either entirely before or entirely after a pass, never in the
//! middle of one.

use crate::core::{
    error::{InternalError, StructuralResult},
    id::{ConnectionId, SocketId, StepId},
    operation::Operation,
    state::{PassReport, PassTrigger},
    value::Value,
    witness::ExceptionListener,
    Pipeline,
};
use crate::event::{EventBus, EventSubscriber};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Cloneable handle to a pipeline shared between tasks
#[derive(Clone)]
pub struct PipelineHandle {
    pipeline: Arc<Mutex<Pipeline>>,
    bus: EventBus,
    runner: Option<mpsc::UnboundedSender<PassTrigger>>,
}

impl PipelineHandle {
    /// Share `pipeline` without a background runner; passes only happen
    /// through [`run`](Self::run).
    pub fn new(pipeline: Pipeline) -> Self {
        let bus = pipeline.bus().clone();
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            bus,
            runner: None,
        }
    }

    /// Share `pipeline` and spawn a runner task that settles it after every
    /// successful edit.
    ///
    /// The runner stops once every clone of the returned handle is dropped.
    /// Must be called from within a tokio runtime.
    pub fn with_runner(pipeline: Pipeline) -> (Self, JoinHandle<()>) {
        let mut handle = Self::new(pipeline);
        let (sender, receiver) = mpsc::unbounded_channel();
        handle.runner = Some(sender);
        let task = tokio::spawn(run_loop(handle.pipeline.clone(), receiver));
        (handle, task)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.bus.subscribe()
    }

    /// Follow the exception events of one step
    pub fn exception_listener(&self, origin: StepId) -> ExceptionListener {
        ExceptionListener::new(origin, &self.bus)
    }

    /// Exclusive access to the pipeline for reads or batched edits
    pub async fn lock(&self) -> MutexGuard<'_, Pipeline> {
        self.pipeline.lock().await
    }

    /// Read from the pipeline under the lock
    pub async fn inspect<R>(&self, f: impl FnOnce(&Pipeline) -> R) -> R {
        let pipeline = self.pipeline.lock().await;
        f(&pipeline)
    }

    /// Run a pass now, waiting behind any edit in progress
    pub async fn run(&self, trigger: PassTrigger) -> Result<PassReport, InternalError> {
        let mut pipeline = self.pipeline.lock().await;
        pipeline.run(trigger)
    }

    /// Ask the runner for a pass. Returns false without a runner.
    pub fn request_pass(&self, trigger: PassTrigger) -> bool {
        match &self.runner {
            Some(sender) => sender.send(trigger).is_ok(),
            None => false,
        }
    }

    pub async fn add_step(
        &self,
        operation: Box<dyn Operation>,
        index: Option<usize>,
    ) -> StructuralResult<StepId> {
        let result = self.pipeline.lock().await.add_step(operation, index);
        self.settle_after(result)
    }

    pub async fn remove_step(&self, step: StepId) -> StructuralResult<()> {
        let result = self.pipeline.lock().await.remove_step(step);
        self.settle_after(result)
    }

    pub async fn move_step(&self, step: StepId, new_index: usize) -> StructuralResult<()> {
        let result = self.pipeline.lock().await.move_step(step, new_index);
        self.settle_after(result)
    }

    pub async fn set_step_enabled(&self, step: StepId, enabled: bool) -> StructuralResult<()> {
        let result = self.pipeline.lock().await.set_step_enabled(step, enabled);
        self.settle_after(result)
    }

    pub async fn connect(&self, output: SocketId, input: SocketId) -> StructuralResult<ConnectionId> {
        let result = self.pipeline.lock().await.connect(output, input);
        self.settle_after(result)
    }

    pub async fn disconnect(&self, connection: ConnectionId) -> StructuralResult<()> {
        let result = self.pipeline.lock().await.disconnect(connection);
        self.settle_after(result)
    }

    pub async fn set_socket_value(&self, socket: SocketId, value: Value) -> StructuralResult<()> {
        let result = self.pipeline.lock().await.set_socket_value(socket, value);
        self.settle_after(result)
    }

    fn settle_after<T>(&self, result: StructuralResult<T>) -> StructuralResult<T> {
        if result.is_ok() {
            self.request_pass(PassTrigger::Settle);
        }
        result
    }
}

/// Runner task: one pass per batch of queued requests
async fn run_loop(pipeline: Arc<Mutex<Pipeline>>, mut requests: mpsc::UnboundedReceiver<PassTrigger>) {
    info!("Pipeline runner started");
    while let Some(mut trigger) = requests.recv().await {
        // Coalesce everything queued so far; an external trigger wins.
        while let Ok(next) = requests.try_recv() {
            if next == PassTrigger::External {
                trigger = next;
            }
        }

        let mut pipeline = pipeline.lock().await;
        match pipeline.run(trigger) {
            Ok(report) => debug!("Runner pass executed {} steps", report.executed.len()),
            Err(e) => error!("Pipeline pass aborted: {}", e),
        }
    }
    info!("Pipeline runner stopped");
}
