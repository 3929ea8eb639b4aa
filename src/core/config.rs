//! Pipeline settings and graph descriptions loaded from YAML
//!
//! A [`GraphConfig`] never touches pipeline internals. [`GraphConfig::build`]
//! replays it through the same commands an interactive client would use, so
//! a description that loads is one a user could have built by hand.

use crate::core::{
    error::StructuralError,
    id::{Direction, SocketId, StepId},
    operation::OperationDescription,
    Pipeline,
};
use crate::event::DEFAULT_EVENT_CAPACITY;
use crate::operations::OperationRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Engine tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Capacity of the event bus ring buffer. Slow subscribers lag past it.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Whether an externally triggered pass re-runs steps without inputs
    #[serde(default = "default_true")]
    pub run_sources_on_trigger: bool,
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_true() -> bool {
    true
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            run_sources_on_trigger: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read graph file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid graph YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Duplicate step label: {0}")]
    DuplicateLabel(String),

    #[error("Step '{label}' uses unknown operation '{operation}'")]
    UnknownOperation { label: String, operation: String },

    #[error("Invalid socket reference '{0}' (expected label.socket)")]
    InvalidEndpoint(String),

    #[error("Unknown step label '{0}'")]
    UnknownLabel(String),

    #[error("Step '{label}' has no {direction} named '{socket}'")]
    UnknownSocket {
        label: String,
        socket: String,
        direction: Direction,
    },

    #[error("Invalid value for '{label}.{socket}': {reason}")]
    InvalidValue {
        label: String,
        socket: String,
        reason: String,
    },

    #[error("Input '{0}' is connected and cannot also be given a value")]
    BoundInput(String),

    #[error("Event capacity must be at least 1")]
    ZeroCapacity,

    #[error("Failed to apply {context}: {source}")]
    Structural {
        context: String,
        #[source]
        source: StructuralError,
    },
}

/// A `label.socket` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub label: String,
    pub socket: String,
}

impl Endpoint {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        match text.trim().split_once('.') {
            Some((label, socket)) if !label.is_empty() && !socket.is_empty() => Ok(Self {
                label: label.to_string(),
                socket: socket.to_string(),
            }),
            _ => Err(ConfigError::InvalidEndpoint(text.to_string())),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.label, self.socket)
    }
}

/// Step entry of a graph description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique label used by connections and overrides
    pub label: String,

    /// Registered operation name
    pub operation: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Literal input values, by input name
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Output endpoint, `label.output`
    pub from: String,
    /// Input endpoint, `label.input`
    pub to: String,
}

/// Graph description loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub name: String,

    #[serde(default)]
    pub settings: PipelineSettings,

    #[serde(default)]
    pub steps: Vec<StepConfig>,

    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

/// A pipeline built from a description, with its step labels resolved
#[derive(Debug)]
pub struct BuiltGraph {
    pub pipeline: Pipeline,
    pub labels: BTreeMap<String, StepId>,
}

impl BuiltGraph {
    /// Resolve a `label.socket` reference in the given direction
    pub fn resolve(&self, endpoint: &Endpoint, direction: Direction) -> Result<SocketId, ConfigError> {
        let step_id = *self
            .labels
            .get(&endpoint.label)
            .ok_or_else(|| ConfigError::UnknownLabel(endpoint.label.clone()))?;
        let socket = self.pipeline.step(step_id).and_then(|step| match direction {
            Direction::Input => step.input_named(&endpoint.socket),
            Direction::Output => step.output_named(&endpoint.socket),
        });
        socket.map(|s| s.id()).ok_or_else(|| ConfigError::UnknownSocket {
            label: endpoint.label.clone(),
            socket: endpoint.socket.clone(),
            direction,
        })
    }

    /// Label of a step, if it came from the description
    pub fn label_of(&self, step: StepId) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, id)| **id == step)
            .map(|(label, _)| label.as_str())
    }
}

impl GraphConfig {
    /// Load a graph description from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a graph description from a YAML string. Only the shape is
    /// checked here; [`validate`](Self::validate) needs a registry.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: GraphConfig = serde_yaml::from_str(yaml)?;
        if config.settings.event_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(config)
    }

    /// Check the description against the registry without building it
    pub fn validate(&self, registry: &OperationRegistry) -> Result<(), ConfigError> {
        let mut described: HashMap<&str, OperationDescription> = HashMap::new();
        for step in &self.steps {
            if described.contains_key(step.label.as_str()) {
                return Err(ConfigError::DuplicateLabel(step.label.clone()));
            }
            let description =
                registry
                    .describe(&step.operation)
                    .ok_or_else(|| ConfigError::UnknownOperation {
                        label: step.label.clone(),
                        operation: step.operation.clone(),
                    })?;

            for (name, literal) in &step.inputs {
                let hint = description
                    .inputs
                    .iter()
                    .find(|hint| hint.name == *name)
                    .ok_or_else(|| ConfigError::UnknownSocket {
                        label: step.label.clone(),
                        socket: name.clone(),
                        direction: Direction::Input,
                    })?;
                hint.value_type
                    .from_yaml(literal)
                    .map_err(|reason| ConfigError::InvalidValue {
                        label: step.label.clone(),
                        socket: name.clone(),
                        reason,
                    })?;
            }
            described.insert(step.label.as_str(), description);
        }

        let mut bound = HashSet::new();
        for connection in &self.connections {
            let from = Endpoint::parse(&connection.from)?;
            let to = Endpoint::parse(&connection.to)?;
            check_endpoint(&described, &from, Direction::Output)?;
            check_endpoint(&described, &to, Direction::Input)?;

            let literal = self
                .steps
                .iter()
                .any(|s| s.label == to.label && s.inputs.contains_key(&to.socket));
            if literal || !bound.insert(to.clone()) {
                return Err(ConfigError::BoundInput(to.to_string()));
            }
        }
        Ok(())
    }

    /// Validate, then build the pipeline through its command interface.
    ///
    /// Type mismatches and cycles are reported by the pipeline itself as
    /// [`ConfigError::Structural`].
    pub fn build(&self, registry: &OperationRegistry) -> Result<BuiltGraph, ConfigError> {
        self.validate(registry)?;

        let mut graph = BuiltGraph {
            pipeline: Pipeline::with_settings(self.name.clone(), self.settings.clone()),
            labels: BTreeMap::new(),
        };

        for step in &self.steps {
            let operation =
                registry
                    .create(&step.operation)
                    .ok_or_else(|| ConfigError::UnknownOperation {
                        label: step.label.clone(),
                        operation: step.operation.clone(),
                    })?;
            let id = graph
                .pipeline
                .add_step(operation, None)
                .map_err(|source| structural(format!("step '{}'", step.label), source))?;
            graph.labels.insert(step.label.clone(), id);
            debug!("Added step '{}' as {}", step.label, id);

            for (name, literal) in &step.inputs {
                let endpoint = Endpoint {
                    label: step.label.clone(),
                    socket: name.clone(),
                };
                let socket = graph.resolve(&endpoint, Direction::Input)?;
                let value_type = graph
                    .pipeline
                    .socket(socket)
                    .map(|s| s.value_type())
                    .ok_or_else(|| ConfigError::UnknownSocket {
                        label: step.label.clone(),
                        socket: name.clone(),
                        direction: Direction::Input,
                    })?;
                let value = value_type
                    .from_yaml(literal)
                    .map_err(|reason| ConfigError::InvalidValue {
                        label: step.label.clone(),
                        socket: name.clone(),
                        reason,
                    })?;
                graph
                    .pipeline
                    .set_socket_value(socket, value)
                    .map_err(|source| structural(format!("value of '{}'", endpoint), source))?;
            }

            if !step.enabled {
                graph
                    .pipeline
                    .set_step_enabled(id, false)
                    .map_err(|source| structural(format!("disabling '{}'", step.label), source))?;
            }
        }

        for connection in &self.connections {
            let from = Endpoint::parse(&connection.from)?;
            let to = Endpoint::parse(&connection.to)?;
            let output = graph.resolve(&from, Direction::Output)?;
            let input = graph.resolve(&to, Direction::Input)?;
            graph.pipeline.connect(output, input).map_err(|source| {
                structural(format!("connection {} -> {}", from, to), source)
            })?;
        }

        Ok(graph)
    }
}

fn check_endpoint(
    described: &HashMap<&str, OperationDescription>,
    endpoint: &Endpoint,
    direction: Direction,
) -> Result<(), ConfigError> {
    let description = described
        .get(endpoint.label.as_str())
        .ok_or_else(|| ConfigError::UnknownLabel(endpoint.label.clone()))?;
    let hints = match direction {
        Direction::Input => &description.inputs,
        Direction::Output => &description.outputs,
    };
    if hints.iter().any(|hint| hint.name == endpoint.socket) {
        Ok(())
    } else {
        Err(ConfigError::UnknownSocket {
            label: endpoint.label.clone(),
            socket: endpoint.socket.clone(),
            direction,
        })
    }
}

fn structural(context: String, source: StructuralError) -> ConfigError {
    ConfigError::Structural { context, source }
}
