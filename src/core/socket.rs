//! Sockets: typed, observable value slots owned by a step.

use crate::core::id::{ConnectionId, SocketId};
use crate::core::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Declared shape of one operation port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketHint {
    /// Port name, unique among the operation's inputs (or outputs)
    pub name: String,

    /// Type every stored value must have
    pub value_type: ValueType,

    /// Optional inputs may be unset when the step executes
    #[serde(default)]
    pub optional: bool,
}

impl SocketHint {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            optional: true,
        }
    }
}

/// A value slot on a step.
///
/// Sockets only hold data; propagation along connections is done by the
/// pipeline, which owns the connection table.
#[derive(Debug, Clone)]
pub struct Socket {
    id: SocketId,
    hint: SocketHint,
    value: Option<Value>,
    dirty: bool,
    connections: BTreeSet<ConnectionId>,
}

impl Socket {
    pub fn new(id: SocketId, hint: SocketHint) -> Self {
        Self {
            id,
            hint,
            value: None,
            dirty: false,
            connections: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn hint(&self) -> &SocketHint {
        &self.hint
    }

    pub fn name(&self) -> &str {
        &self.hint.name
    }

    pub fn value_type(&self) -> ValueType {
        self.hint.value_type
    }

    pub fn get(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Store `value` after coercing it to the declared type.
    ///
    /// Returns `Ok(true)` when the stored value changed, in which case the
    /// socket is now dirty. Storing an equal value is a no-op.
    pub fn set(&mut self, value: Value) -> Result<bool, Value> {
        let value = match self.hint.value_type.coerce(value.clone()) {
            Some(v) => v,
            None => return Err(value),
        };
        if self.value.as_ref().is_some_and(|current| current.same_as(&value)) {
            return Ok(false);
        }
        self.value = Some(value);
        self.dirty = true;
        Ok(true)
    }

    /// Remove the stored value. Returns whether there was one.
    pub fn unset(&mut self) -> bool {
        if self.value.take().is_some() {
            self.dirty = true;
            true
        } else {
            false
        }
    }

    /// Store an already validated value (or none) without a type check.
    /// Returns whether the stored value changed.
    pub(crate) fn replace(&mut self, value: Option<Value>) -> bool {
        let unchanged = match (&self.value, &value) {
            (Some(current), Some(next)) => current.same_as(next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return false;
        }
        self.value = value;
        self.dirty = true;
        true
    }

    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().copied()
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    pub(crate) fn attach(&mut self, connection: ConnectionId) {
        self.connections.insert(connection);
    }

    pub(crate) fn detach(&mut self, connection: ConnectionId) {
        self.connections.remove(&connection);
    }
}
