//! The contract every pluggable operation implements.

use crate::core::error::OperationError;
use crate::core::socket::SocketHint;
use crate::core::value::{Image, Value};
use serde::{Deserialize, Serialize};

/// Static description of an operation: its name and port signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescription {
    /// Registry name, e.g. "threshold"
    pub name: String,

    /// One-line summary shown to users
    pub summary: String,

    /// Ordered input ports
    pub inputs: Vec<SocketHint>,

    /// Ordered output ports
    pub outputs: Vec<SocketHint>,
}

impl OperationDescription {
    pub fn new(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, hint: SocketHint) -> Self {
        self.inputs.push(hint);
        self
    }

    pub fn output(mut self, hint: SocketHint) -> Self {
        self.outputs.push(hint);
        self
    }
}

/// Input values handed to [`Operation::perform`], in port order.
///
/// Required inputs are guaranteed to be present; optional ones may be
/// `None`.
#[derive(Debug, Clone)]
pub struct OperationInputs {
    names: Vec<String>,
    values: Vec<Option<Value>>,
}

impl OperationInputs {
    pub fn new(names: Vec<String>, values: Vec<Option<Value>>) -> Self {
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    fn name(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("#{}", index))
    }

    fn require(&self, index: usize) -> Result<&Value, OperationError> {
        self.get(index)
            .ok_or_else(|| OperationError::invalid_input(self.name(index), "no value"))
    }

    pub fn number(&self, index: usize) -> Result<f64, OperationError> {
        self.require(index)?
            .as_number()
            .ok_or_else(|| OperationError::invalid_input(self.name(index), "not a number"))
    }

    /// Like [`number`](Self::number) but yields `None` for an unset input.
    pub fn optional_number(&self, index: usize) -> Result<Option<f64>, OperationError> {
        match self.get(index) {
            None => Ok(None),
            Some(_) => self.number(index).map(Some),
        }
    }

    pub fn image(&self, index: usize) -> Result<&Image, OperationError> {
        self.require(index)?
            .as_image()
            .ok_or_else(|| OperationError::invalid_input(self.name(index), "not an image"))
    }
}

/// A transform executed by a step.
///
/// Implementations are synchronous and bounded in time. They may keep state
/// between calls; the engine gives each step its own instance.
pub trait Operation: Send {
    /// Name and port signature. Must not change over the instance's life.
    fn description(&self) -> &OperationDescription;

    /// Compute one value per declared output, in port order.
    fn perform(&mut self, inputs: &OperationInputs) -> Result<Vec<Value>, OperationError>;

    /// Release resources when the owning step leaves the pipeline.
    fn cleanup(&mut self) {}
}
