//! Test: Structural edits - rejected commands change nothing, accepted ones emit their event

use crate::helpers::*;
use visionflow::core::{ExecutionError, StructuralError, Value};
use visionflow::operations::image::{Checkerboard, Invert, MeanIntensity};
use visionflow::{PassTrigger, Pipeline, PipelineEvent, SocketId, StepId, StepStatus};

/// A cycle-closing connect is rejected and leaves the graph unchanged
#[test]
fn test_cycle_rejected_without_side_effects() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("cycle");
    let steps = recorder_chain(&mut pipeline, &log, &["A", "B", "C"]);
    let generation = pipeline.generation();
    let mut events = pipeline.subscribe();

    let result = pipeline.connect(output(steps[2]), input(steps[0]));

    assert_eq!(
        result,
        Err(StructuralError::Cycle {
            from: steps[2],
            to: steps[0],
        })
    );
    assert_eq!(pipeline.connections().count(), 2);
    assert_eq!(pipeline.generation(), generation);
    assert!(drain_events(&mut events).is_empty());
}

#[test]
fn test_self_connection_is_a_cycle() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("self");
    let a = pipeline.add_step(Recorder::new("A", &log), None).unwrap();

    assert!(matches!(
        pipeline.connect(output(a), input(a)),
        Err(StructuralError::Cycle { .. })
    ));
}

/// A second connection into the same input fails; the first remains
#[test]
fn test_second_connection_into_input_rejected() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("fan-in");
    let a = pipeline.add_step(Recorder::new("A", &log), None).unwrap();
    let b = pipeline.add_step(Recorder::new("B", &log), None).unwrap();
    let c = pipeline.add_step(Recorder::new("C", &log), None).unwrap();
    let first = pipeline.connect(output(a), input(c)).unwrap();

    assert_eq!(
        pipeline.connect(output(b), input(c)),
        Err(StructuralError::AlreadyConnected(input(c)))
    );
    let incoming = pipeline.incoming(input(c)).unwrap();
    assert_eq!(incoming.id, first);
    assert_eq!(incoming.from, output(a));
}

#[test]
fn test_type_mismatch_rejected() {
    let mut pipeline = Pipeline::new("types");
    let stats = pipeline.add_step(Box::new(MeanIntensity::new()), None).unwrap();
    let invert = pipeline.add_step(Box::new(Invert::new()), None).unwrap();

    assert!(matches!(
        pipeline.connect(output(stats), input(invert)),
        Err(StructuralError::TypeMismatch { .. })
    ));
    assert_eq!(
        pipeline.connect(input(invert), input(stats)),
        Err(StructuralError::DirectionMismatch {
            socket: input(invert),
            expected: visionflow::core::Direction::Output,
        })
    );
    assert_eq!(
        pipeline.connect(output(stats), SocketId::input(invert, 3)),
        Err(StructuralError::UnknownSocket(SocketId::input(invert, 3)))
    );
    assert_eq!(pipeline.connections().count(), 0);
}

/// Connecting copies an existing upstream value and dirties the input
#[test]
fn test_connect_copies_upstream_value() {
    let mut pipeline = Pipeline::new("copy");
    let board = pipeline.add_step(Box::new(Checkerboard::new()), None).unwrap();
    pipeline.run(PassTrigger::External).unwrap();

    let stats = pipeline.add_step(Box::new(MeanIntensity::new()), None).unwrap();
    pipeline.connect(output(board), input(stats)).unwrap();
    let socket = pipeline.socket(input(stats)).unwrap();
    assert!(socket.is_dirty());
    assert!(socket.get().is_some());

    let report = pipeline.run(PassTrigger::Settle).unwrap();
    assert_eq!(report.executed, vec![stats]);
    assert_eq!(number(&pipeline, output(stats)), Some(127.5));
}

/// Disconnecting the sole feed of a required input fails the consumer
#[test]
fn test_disconnect_marks_input_dirty() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("disconnect");
    let steps = recorder_chain(&mut pipeline, &log, &["A", "B"]);
    pipeline.set_socket_value(input(steps[0]), Value::Number(1.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    log.take();

    let connection = pipeline.incoming(input(steps[1])).unwrap().id;
    pipeline.disconnect(connection).unwrap();
    let socket = pipeline.socket(input(steps[1])).unwrap();
    assert!(socket.is_dirty());
    assert!(socket.get().is_none());
    assert_eq!(
        pipeline.disconnect(connection),
        Err(StructuralError::UnknownConnection(connection))
    );

    pipeline.run(PassTrigger::Settle).unwrap();
    assert!(log.entries().is_empty());
    assert_eq!(pipeline.step(steps[1]).unwrap().status(), StepStatus::Failed);
    assert!(matches!(
        pipeline.exception(steps[1]).unwrap().error,
        Some(ExecutionError::MissingInput { .. })
    ));
}

/// Removing a step removes its connections first, then the step
#[test]
fn test_remove_step_cascades_connections() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("remove");
    let steps = recorder_chain(&mut pipeline, &log, &["A", "B", "C"]);
    let mut events = pipeline.subscribe();

    pipeline.remove_step(steps[1]).unwrap();

    assert_eq!(pipeline.connections().count(), 0);
    assert_eq!(pipeline.step_ids(), &[steps[0], steps[2]]);
    assert!(pipeline.step(steps[1]).is_none());

    let events = drain_events(&mut events);
    let removed_connections = events
        .iter()
        .take_while(|e| !matches!(e, PipelineEvent::StepRemoved { .. }))
        .filter(|e| matches!(e, PipelineEvent::ConnectionRemoved { .. }))
        .count();
    assert_eq!(removed_connections, 2);
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::StepRemoved { step }) if *step == steps[1]
    ));
    assert_eq!(
        pipeline.remove_step(steps[1]),
        Err(StructuralError::UnknownStep(steps[1]))
    );
}

/// Inputs fed by a connection cannot be set from outside
#[test]
fn test_bound_input_rejects_external_value() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("bound");
    let steps = recorder_chain(&mut pipeline, &log, &["A", "B"]);

    assert_eq!(
        pipeline.set_socket_value(input(steps[1]), Value::Number(1.0)),
        Err(StructuralError::SocketBound(input(steps[1])))
    );
    assert!(matches!(
        pipeline.set_socket_value(input(steps[0]), Value::Text("one".into())),
        Err(StructuralError::InvalidValue { .. })
    ));
    assert_eq!(
        pipeline.set_socket_value(input(StepId(99)), Value::Number(1.0)),
        Err(StructuralError::UnknownStep(StepId(99)))
    );
    assert!(pipeline.value(input(steps[0])).is_none());
}

/// Add and move publish their events with the indices involved
#[test]
fn test_add_and_move_events() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("events");
    let mut events = pipeline.subscribe();
    let a = pipeline.add_step(Recorder::new("A", &log), None).unwrap();
    let b = pipeline.add_step(Recorder::new("B", &log), Some(0)).unwrap();
    pipeline.move_step(b, 1).unwrap();

    let events = drain_events(&mut events);
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        PipelineEvent::StepAdded { step, index: None, .. } if *step == a
    ));
    assert!(matches!(
        &events[1],
        PipelineEvent::StepAdded { step, index: Some(0), operation } if *step == b && operation == "record"
    ));
    assert!(matches!(
        &events[2],
        PipelineEvent::StepMoved { step, from_index: 0, to_index: 1 } if *step == b
    ));
    assert_eq!(pipeline.step_ids(), &[a, b]);
    assert!(matches!(
        pipeline.move_step(a, 2),
        Err(StructuralError::IndexOutOfBounds { index: 2, len: 2 })
    ));
}
