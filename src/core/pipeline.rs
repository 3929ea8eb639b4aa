//! Pipeline domain model
//!
//! The pipeline owns every step and connection and is the only place graph
//! edits happen. Each command validates fully before touching anything, so
//! a rejected command leaves the graph exactly as it was and publishes
//! nothing.

use crate::core::{
    config::PipelineSettings,
    connection::Connection,
    error::{InternalError, StructuralError, StructuralResult},
    id::{ConnectionId, Direction, SocketId, StepId},
    operation::Operation,
    socket::Socket,
    state::{PassReport, PassTrigger, StepStatus},
    step::Step,
    value::Value,
    witness::{ExceptionRecord, ExceptionWitness},
};
use crate::event::{EventBus, EventSubscriber, PipelineEvent};
use crate::execution::scheduler;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, info};
use uuid::Uuid;

/// An editable graph of steps
pub struct Pipeline {
    /// Instance ID
    id: Uuid,

    /// Pipeline name
    name: String,

    settings: PipelineSettings,

    /// Steps by ID
    steps: HashMap<StepId, Step>,

    /// Step order; the scheduler's tie-break
    order: Vec<StepId>,

    connections: BTreeMap<ConnectionId, Connection>,

    /// Incremented on every structural edit
    generation: u64,

    next_step_id: u64,

    next_connection_id: u64,

    witness: ExceptionWitness,

    bus: EventBus,
}

impl Pipeline {
    /// Create an empty pipeline with its own event bus
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, PipelineSettings::default())
    }

    pub fn with_settings(name: impl Into<String>, settings: PipelineSettings) -> Self {
        let bus = EventBus::new(settings.event_capacity);
        Self::with_bus(name, settings, bus)
    }

    /// Create an empty pipeline publishing on an existing bus
    pub fn with_bus(name: impl Into<String>, settings: PipelineSettings, bus: EventBus) -> Self {
        Pipeline {
            id: Uuid::new_v4(),
            name: name.into(),
            settings,
            steps: HashMap::new(),
            order: Vec::new(),
            connections: BTreeMap::new(),
            generation: 0,
            next_step_id: 1,
            next_connection_id: 1,
            witness: ExceptionWitness::new(bus.clone()),
            bus,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.bus.subscribe()
    }

    pub fn witness(&self) -> &ExceptionWitness {
        &self.witness
    }

    /// Live exception record of `step`, if its last execution failed
    pub fn exception(&self, step: StepId) -> Option<&ExceptionRecord> {
        self.witness.record(step)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Get a step by ID
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.get(&id)
    }

    /// Steps in pipeline order
    pub fn steps(&self) -> impl Iterator<Item = &Step> + '_ {
        self.order.iter().filter_map(move |id| self.steps.get(id))
    }

    pub fn step_ids(&self) -> &[StepId] {
        &self.order
    }

    pub fn index_of(&self, id: StepId) -> Option<usize> {
        self.order.iter().position(|s| *s == id)
    }

    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        self.steps.get(&id.step).and_then(|step| step.socket(id))
    }

    /// Current value of a socket
    pub fn value(&self, id: SocketId) -> Option<&Value> {
        self.socket(id).and_then(Socket::get)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.values()
    }

    /// The connection feeding `input`, if any
    pub fn incoming(&self, input: SocketId) -> Option<&Connection> {
        self.connections.values().find(|c| c.to == input)
    }

    /// Steps feeding `step` directly
    pub fn upstream_steps(&self, step: StepId) -> BTreeSet<StepId> {
        self.connections
            .values()
            .filter(|c| c.to.step == step)
            .map(|c| c.from.step)
            .collect()
    }

    /// Steps fed by `step` directly
    pub fn downstream_steps(&self, step: StepId) -> BTreeSet<StepId> {
        self.connections
            .values()
            .filter(|c| c.from.step == step)
            .map(|c| c.to.step)
            .collect()
    }

    /// Whether `to` can be reached from `from` by following connections
    /// downstream. A step reaches itself.
    pub fn reaches(&self, from: StepId, to: StepId) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if seen.insert(current) {
                queue.extend(self.downstream_steps(current));
            }
        }
        false
    }

    /// Run a re-evaluation pass on the calling thread
    pub fn run(&mut self, trigger: PassTrigger) -> Result<PassReport, InternalError> {
        scheduler::run_pass(self, trigger)
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Add a step wrapping `operation`, appended when `index` is `None`
    pub fn add_step(
        &mut self,
        operation: Box<dyn Operation>,
        index: Option<usize>,
    ) -> StructuralResult<StepId> {
        if let Some(index) = index {
            if index > self.order.len() {
                return Err(StructuralError::IndexOutOfBounds {
                    index,
                    len: self.order.len(),
                });
            }
        }

        let id = StepId(self.next_step_id);
        self.next_step_id += 1;
        let step = Step::new(id, operation);
        let operation = step.name().to_string();

        match index {
            Some(index) => self.order.insert(index, id),
            None => self.order.push(id),
        }
        self.steps.insert(id, step);
        self.bump_generation();

        info!("Added {} ({}) at {:?}", id, operation, index);
        self.bus.publish(PipelineEvent::StepAdded {
            step: id,
            operation,
            index,
        });
        Ok(id)
    }

    /// Remove a step, detaching all of its connections first
    pub fn remove_step(&mut self, id: StepId) -> StructuralResult<()> {
        let index = self.index_of(id).ok_or(StructuralError::UnknownStep(id))?;

        let attached: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.touches(id))
            .map(|c| c.id)
            .collect();
        for connection in attached {
            self.detach_connection(connection);
        }

        self.order.remove(index);
        if let Some(mut step) = self.steps.remove(&id) {
            step.cleanup();
        }
        self.witness.report_cleared(id);
        self.bump_generation();

        info!("Removed {}", id);
        self.bus.publish(PipelineEvent::StepRemoved { step: id });
        Ok(())
    }

    /// Move a step to `new_index` in pipeline order
    pub fn move_step(&mut self, id: StepId, new_index: usize) -> StructuralResult<()> {
        let from_index = self.index_of(id).ok_or(StructuralError::UnknownStep(id))?;
        if new_index >= self.order.len() {
            return Err(StructuralError::IndexOutOfBounds {
                index: new_index,
                len: self.order.len(),
            });
        }

        self.order.remove(from_index);
        self.order.insert(new_index, id);
        self.bump_generation();

        debug!("Moved {} from {} to {}", id, from_index, new_index);
        self.bus.publish(PipelineEvent::StepMoved {
            step: id,
            from_index,
            to_index: new_index,
        });
        Ok(())
    }

    /// Enable or disable a step.
    ///
    /// Disabling marks every input fed by the step dirty, so consumers
    /// re-run on the next pass against the frozen outputs. Re-enabling marks
    /// the step itself stale.
    pub fn set_step_enabled(&mut self, id: StepId, enabled: bool) -> StructuralResult<()> {
        let step = self
            .steps
            .get_mut(&id)
            .ok_or(StructuralError::UnknownStep(id))?;
        if step.is_enabled() == enabled {
            return Ok(());
        }
        step.set_enabled(enabled);

        if !enabled {
            let targets: Vec<SocketId> = self
                .connections
                .values()
                .filter(|c| c.from.step == id)
                .map(|c| c.to)
                .collect();
            for target in targets {
                if let Some(socket) = self.socket_mut(target) {
                    socket.mark_dirty();
                }
            }
        }
        self.bump_generation();

        info!("{} {}", id, if enabled { "enabled" } else { "disabled" });
        self.bus
            .publish(PipelineEvent::StepEnabledChanged { step: id, enabled });
        Ok(())
    }

    /// Connect an output socket to an input socket
    pub fn connect(&mut self, output: SocketId, input: SocketId) -> StructuralResult<ConnectionId> {
        if !output.is_output() {
            return Err(StructuralError::DirectionMismatch {
                socket: output,
                expected: Direction::Output,
            });
        }
        if !input.is_input() {
            return Err(StructuralError::DirectionMismatch {
                socket: input,
                expected: Direction::Input,
            });
        }
        let source = self.existing_socket(output)?;
        let target = self.existing_socket(input)?;

        if !target.value_type().accepts(source.value_type()) {
            return Err(StructuralError::TypeMismatch {
                source_type: source.value_type(),
                target_type: target.value_type(),
            });
        }
        if target.is_connected() {
            return Err(StructuralError::AlreadyConnected(input));
        }
        if self.reaches(input.step, output.step) {
            return Err(StructuralError::Cycle {
                from: output.step,
                to: input.step,
            });
        }

        let value = source
            .get()
            .cloned()
            .and_then(|v| target.value_type().coerce(v));

        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;
        let connection = Connection {
            id,
            from: output,
            to: input,
        };
        self.connections.insert(id, connection);
        if let Some(socket) = self.socket_mut(output) {
            socket.attach(id);
        }
        if let Some(socket) = self.socket_mut(input) {
            socket.attach(id);
            let has_value = value.is_some();
            let changed = socket.replace(value.clone());
            if has_value {
                socket.mark_dirty();
            }
            if changed {
                self.bus.publish(PipelineEvent::SocketChanged {
                    socket: input,
                    value,
                });
            }
        }
        self.bump_generation();

        info!("Connected {} -> {} as {}", output, input, id);
        self.bus.publish(PipelineEvent::ConnectionAdded { connection });
        Ok(id)
    }

    /// Remove a connection; the former input becomes unset and dirty
    pub fn disconnect(&mut self, id: ConnectionId) -> StructuralResult<()> {
        if !self.connections.contains_key(&id) {
            return Err(StructuralError::UnknownConnection(id));
        }
        self.detach_connection(id);
        self.bump_generation();
        Ok(())
    }

    /// Set a socket's value from outside.
    ///
    /// Inputs fed by a connection are rejected; setting an output propagates
    /// to every connected input.
    pub fn set_socket_value(&mut self, id: SocketId, value: Value) -> StructuralResult<()> {
        let socket = self.existing_socket(id)?;
        if id.is_input() && socket.is_connected() {
            return Err(StructuralError::SocketBound(id));
        }
        let expected = socket.value_type();
        let actual = value.value_type();
        if !expected.accepts(actual) {
            return Err(StructuralError::InvalidValue { expected, actual });
        }

        let changed = match self.socket_mut(id).map(|socket| socket.set(value)) {
            Some(Ok(changed)) => changed,
            _ => return Err(StructuralError::InvalidValue { expected, actual }),
        };
        if !changed {
            return Ok(());
        }

        debug!("Set {} externally", id);
        if id.is_input() {
            self.bus.publish(PipelineEvent::SocketChanged {
                socket: id,
                value: self.value(id).cloned(),
            });
        } else {
            self.propagate_output(id);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Pass support
    // ---------------------------------------------------------------------

    /// Execute one step and push its fresh outputs downstream. Disabled
    /// steps are skipped but still have their input dirtiness consumed.
    /// Returns the step's status when it executed.
    pub(crate) fn execute_step(&mut self, id: StepId) -> Option<StepStatus> {
        let generation = self.generation;
        let step = self.steps.get_mut(&id)?;
        let executed = step.is_enabled();
        if executed {
            // Already recorded in the step status and the witness.
            if let Err(error) = step.execute(&mut self.witness, generation) {
                debug!("{} failed during pass: {}", id, error);
            }
        }
        for socket in step.inputs_mut() {
            socket.clear_dirty();
        }
        let status = step.status();

        let outputs: Vec<SocketId> = step
            .outputs()
            .iter()
            .filter(|s| s.is_dirty())
            .map(Socket::id)
            .collect();
        for output in outputs {
            self.propagate_output(output);
        }
        executed.then_some(status)
    }

    /// Every connection must reference steps that exist
    pub(crate) fn check_integrity(&self) -> Result<(), InternalError> {
        for connection in self.connections.values() {
            for step in [connection.from.step, connection.to.step] {
                if !self.steps.contains_key(&step) {
                    return Err(InternalError::OrphanedConnection {
                        connection: connection.id,
                        step,
                    });
                }
            }
        }
        Ok(())
    }

    /// Insert a connection bypassing every check, so tests can break the
    /// invariants the commands maintain
    #[cfg(test)]
    pub(crate) fn insert_connection_unchecked(&mut self, from: SocketId, to: SocketId) -> ConnectionId {
        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;
        self.connections.insert(id, Connection { id, from, to });
        id
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn bump_generation(&mut self) {
        self.generation += 1;
    }

    fn existing_socket(&self, id: SocketId) -> StructuralResult<&Socket> {
        let step = self
            .steps
            .get(&id.step)
            .ok_or(StructuralError::UnknownStep(id.step))?;
        step.socket(id).ok_or(StructuralError::UnknownSocket(id))
    }

    fn socket_mut(&mut self, id: SocketId) -> Option<&mut Socket> {
        self.steps
            .get_mut(&id.step)
            .and_then(|step| step.socket_mut(id))
    }

    /// Publish a changed output and copy it into every connected input
    fn propagate_output(&mut self, output: SocketId) {
        let Some(socket) = self.socket_mut(output) else {
            return;
        };
        socket.clear_dirty();
        let value = socket.get().cloned();
        let attached: Vec<ConnectionId> = socket.connections().collect();
        let targets: Vec<SocketId> = attached
            .iter()
            .filter_map(|c| self.connections.get(c).map(|c| c.to))
            .collect();

        self.bus.publish(PipelineEvent::SocketChanged {
            socket: output,
            value: value.clone(),
        });

        for target in targets {
            let Some(socket) = self.socket_mut(target) else {
                continue;
            };
            let coerced = value
                .clone()
                .and_then(|v| socket.value_type().coerce(v));
            if socket.replace(coerced.clone()) {
                self.bus.publish(PipelineEvent::SocketChanged {
                    socket: target,
                    value: coerced,
                });
            }
        }
    }

    /// Remove a connection without touching the generation
    fn detach_connection(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.remove(&id) else {
            return;
        };
        if let Some(socket) = self.socket_mut(connection.from) {
            socket.detach(id);
        }
        if let Some(socket) = self.socket_mut(connection.to) {
            socket.detach(id);
            let had_value = socket.unset();
            socket.mark_dirty();
            if had_value {
                self.bus.publish(PipelineEvent::SocketChanged {
                    socket: connection.to,
                    value: None,
                });
            }
        }

        info!("Disconnected {} ({} -> {})", id, connection.from, connection.to);
        self.bus.publish(PipelineEvent::ConnectionRemoved { connection });
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("steps", &self.order)
            .field("connections", &self.connections.len())
            .finish()
    }
}
