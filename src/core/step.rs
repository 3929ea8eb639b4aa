//! Step domain model

use crate::core::{
    error::{ExecutionError, OperationError},
    id::{Direction, SocketId, StepId},
    operation::{Operation, OperationDescription, OperationInputs},
    socket::Socket,
    state::StepStatus,
    value::Value,
    witness::ExceptionWitness,
};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// A node of the pipeline: one operation instance and its sockets
pub struct Step {
    /// Stable step identifier
    id: StepId,

    /// The wrapped operation
    operation: Box<dyn Operation>,

    /// Input sockets in port order
    inputs: Vec<Socket>,

    /// Output sockets in port order
    outputs: Vec<Socket>,

    /// Disabled steps never execute; their outputs stay frozen
    enabled: bool,

    /// Set until the step runs for the first time after creation or
    /// re-enabling
    stale: bool,

    /// Outcome of the most recent execution
    status: StepStatus,
}

impl Step {
    /// Create a step whose sockets mirror the operation's declared ports
    pub fn new(id: StepId, operation: Box<dyn Operation>) -> Self {
        let description = operation.description();
        let inputs = description
            .inputs
            .iter()
            .enumerate()
            .map(|(index, hint)| Socket::new(SocketId::input(id, index), hint.clone()))
            .collect();
        let outputs = description
            .outputs
            .iter()
            .enumerate()
            .map(|(index, hint)| Socket::new(SocketId::output(id, index), hint.clone()))
            .collect();

        Step {
            id,
            operation,
            inputs,
            outputs,
            enabled: true,
            stale: true,
            status: StepStatus::Idle,
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn description(&self) -> &OperationDescription {
        self.operation.description()
    }

    /// Operation name, e.g. "threshold"
    pub fn name(&self) -> &str {
        &self.operation.description().name
    }

    pub fn inputs(&self) -> &[Socket] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Socket] {
        &self.outputs
    }

    pub fn input(&self, index: usize) -> Option<&Socket> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&Socket> {
        self.outputs.get(index)
    }

    pub fn input_named(&self, name: &str) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.name() == name)
    }

    pub fn output_named(&self, name: &str) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.name() == name)
    }

    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        if id.step != self.id {
            return None;
        }
        match id.direction {
            Direction::Input => self.inputs.get(id.index),
            Direction::Output => self.outputs.get(id.index),
        }
    }

    pub(crate) fn socket_mut(&mut self, id: SocketId) -> Option<&mut Socket> {
        if id.step != self.id {
            return None;
        }
        match id.direction {
            Direction::Input => self.inputs.get_mut(id.index),
            Direction::Output => self.outputs.get_mut(id.index),
        }
    }

    pub(crate) fn inputs_mut(&mut self) -> &mut [Socket] {
        &mut self.inputs
    }

    pub(crate) fn outputs_mut(&mut self) -> &mut [Socket] {
        &mut self.outputs
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.stale = true;
        }
        self.enabled = enabled;
    }

    /// Whether the step has not run since it was created or re-enabled
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn has_dirty_input(&self) -> bool {
        self.inputs.iter().any(Socket::is_dirty)
    }

    /// Steps without inputs are sources; they re-run on external triggers
    pub fn is_source(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Execute the operation against the current input values.
    ///
    /// Failures (missing inputs, operation errors, panics) are reported to
    /// `witness`, reset every output to unset and are returned for
    /// information only. Success clears any previous exception record.
    /// Input dirtiness is left for the scheduler to clear.
    pub fn execute(
        &mut self,
        witness: &mut ExceptionWitness,
        generation: u64,
    ) -> Result<(), ExecutionError> {
        if !self.enabled {
            return Ok(());
        }
        self.stale = false;

        let result = self.perform();
        match &result {
            Ok(()) => {
                debug!("{} ({}) succeeded", self.id, self.name());
                self.status = StepStatus::Succeeded;
                witness.report_cleared(self.id);
            }
            Err(error) => {
                self.status = StepStatus::Failed;
                for socket in &mut self.outputs {
                    socket.unset();
                }
                witness.report_failure(self.id, error.to_string(), Some(error.clone()), generation);
            }
        }
        result
    }

    fn perform(&mut self) -> Result<(), ExecutionError> {
        let mut names = Vec::with_capacity(self.inputs.len());
        let mut values = Vec::with_capacity(self.inputs.len());
        for (index, socket) in self.inputs.iter().enumerate() {
            if socket.get().is_none() && !socket.hint().optional {
                return Err(ExecutionError::MissingInput {
                    name: socket.name().to_string(),
                    index,
                });
            }
            names.push(socket.name().to_string());
            values.push(socket.get().cloned());
        }
        let inputs = OperationInputs::new(names, values);

        let operation = &mut self.operation;
        let outputs = panic::catch_unwind(AssertUnwindSafe(|| operation.perform(&inputs)))
            .map_err(|payload| OperationError::Panicked(panic_message(payload.as_ref())))??;

        if outputs.len() != self.outputs.len() {
            return Err(OperationError::OutputCount {
                expected: self.outputs.len(),
                actual: outputs.len(),
            }
            .into());
        }

        // Validate every output before writing any, so a bad result leaves
        // no partial state behind.
        let mut coerced = Vec::with_capacity(outputs.len());
        for (socket, value) in self.outputs.iter().zip(outputs) {
            let actual = value.value_type();
            let value: Value = socket.value_type().coerce(value).ok_or_else(|| {
                OperationError::OutputType {
                    name: socket.name().to_string(),
                    expected: socket.value_type(),
                    actual,
                }
            })?;
            coerced.push(value);
        }
        for (socket, value) in self.outputs.iter_mut().zip(coerced) {
            socket.replace(Some(value));
        }
        Ok(())
    }

    /// Hand the operation a chance to release resources before removal
    pub(crate) fn cleanup(&mut self) {
        self.operation.cleanup();
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("operation", &self.name())
            .field("enabled", &self.enabled)
            .field("status", &self.status)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
