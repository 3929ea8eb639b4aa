//! Scalar arithmetic

use crate::core::{
    error::OperationError,
    operation::{Operation, OperationDescription, OperationInputs},
    socket::SocketHint,
    value::{Value, ValueType},
};
use crate::operations::OperationRegistry;

pub fn register(registry: &mut OperationRegistry) {
    registry.register(|| Box::new(Add::new()));
    registry.register(|| Box::new(Scale::new()));
}

pub struct Add {
    description: OperationDescription,
}

impl Add {
    pub fn new() -> Self {
        Self {
            description: OperationDescription::new("add", "Sum of two numbers")
                .input(SocketHint::new("a", ValueType::Number))
                .input(SocketHint::new("b", ValueType::Number))
                .output(SocketHint::new("sum", ValueType::Number)),
        }
    }
}

impl Default for Add {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for Add {
    fn description(&self) -> &OperationDescription {
        &self.description
    }

    fn perform(&mut self, inputs: &OperationInputs) -> Result<Vec<Value>, OperationError> {
        Ok(vec![Value::Number(inputs.number(0)? + inputs.number(1)?)])
    }
}

/// Multiply by a factor, 1 when the factor is unset
pub struct Scale {
    description: OperationDescription,
}

impl Scale {
    pub fn new() -> Self {
        Self {
            description: OperationDescription::new("scale", "Multiply a number by a factor")
                .input(SocketHint::new("value", ValueType::Number))
                .input(SocketHint::optional("factor", ValueType::Number))
                .output(SocketHint::new("result", ValueType::Number)),
        }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for Scale {
    fn description(&self) -> &OperationDescription {
        &self.description
    }

    fn perform(&mut self, inputs: &OperationInputs) -> Result<Vec<Value>, OperationError> {
        let value = inputs.number(0)?;
        let factor = inputs.optional_number(1)?.unwrap_or(1.0);
        let result = value * factor;
        if !result.is_finite() {
            return Err(OperationError::failed(format!(
                "{} * {} is not finite",
                value, factor
            )));
        }
        Ok(vec![Value::Number(result)])
    }
}
