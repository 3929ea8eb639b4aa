//! Test: Exception witness - records per origin, raised and cleared through events

use crate::helpers::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use visionflow::core::witness::{ExceptionListener, ExceptionNotice};
use visionflow::core::Value;
use visionflow::{PassTrigger, Pipeline, PipelineEvent, PipelineSettings};

/// Exception followed by ExceptionCleared leaves no record
#[test]
fn test_raise_then_clear_leaves_no_record() {
    let log = ExecutionLog::new();
    let failing = Arc::new(AtomicBool::new(true));
    let mut pipeline = Pipeline::new("clear");
    let step = pipeline.add_step(Flaky::new("F", &log, &failing), None).unwrap();
    let mut events = pipeline.subscribe();

    pipeline.set_socket_value(input(step), Value::Number(1.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    assert!(pipeline.exception(step).is_some());
    assert_eq!(pipeline.exception(step).unwrap().origin, step);

    failing.store(false, Ordering::SeqCst);
    pipeline.set_socket_value(input(step), Value::Number(2.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();

    assert!(pipeline.exception(step).is_none());
    assert!(pipeline.witness().is_empty());

    let exception_events: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                PipelineEvent::Exception { .. } | PipelineEvent::ExceptionCleared { .. }
            )
        })
        .collect();
    assert_eq!(exception_events.len(), 2);
    assert!(matches!(
        &exception_events[0],
        PipelineEvent::Exception { origin, message, .. } if *origin == step && message.contains("switched off")
    ));
    assert!(matches!(
        &exception_events[1],
        PipelineEvent::ExceptionCleared { origin } if *origin == step
    ));
}

/// A listener only hears about the step it follows
#[test]
fn test_listener_filters_by_origin() {
    let log = ExecutionLog::new();
    let failing = Arc::new(AtomicBool::new(true));
    let mut pipeline = Pipeline::new("listeners");
    let first = pipeline.add_step(Flaky::new("first", &log, &failing), None).unwrap();
    let second = pipeline.add_step(Flaky::new("second", &log, &failing), None).unwrap();
    let mut listener = ExceptionListener::new(second, pipeline.bus());

    pipeline.set_socket_value(input(first), Value::Number(1.0)).unwrap();
    pipeline.set_socket_value(input(second), Value::Number(1.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    assert_eq!(pipeline.witness().records().len(), 2);

    match listener.try_next() {
        Some(ExceptionNotice::Raised { message, .. }) => assert!(message.contains("second")),
        other => panic!("expected a raised notice, got {:?}", other),
    }
    assert_eq!(listener.try_next(), None);

    failing.store(false, Ordering::SeqCst);
    pipeline.set_socket_value(input(first), Value::Number(2.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    // Only the first step recovered; nothing for this listener.
    assert_eq!(listener.try_next(), None);

    pipeline.set_socket_value(input(second), Value::Number(2.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    assert_eq!(listener.try_next(), Some(ExceptionNotice::Cleared));
}

/// Removing a failed step drops its record
#[test]
fn test_removed_step_clears_record() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("remove");
    let step = pipeline.add_step(Recorder::new("A", &log), None).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    assert!(pipeline.exception(step).is_some());

    let mut listener = ExceptionListener::new(step, pipeline.bus());
    pipeline.remove_step(step).unwrap();

    assert!(pipeline.witness().is_empty());
    assert_eq!(listener.try_next(), Some(ExceptionNotice::Cleared));
}

/// A repeated failure replaces the record instead of stacking
#[test]
fn test_repeated_failure_replaces_record() {
    let log = ExecutionLog::new();
    let failing = Arc::new(AtomicBool::new(true));
    let mut pipeline = Pipeline::new("replace");
    let step = pipeline.add_step(Flaky::new("F", &log, &failing), None).unwrap();

    pipeline.set_socket_value(input(step), Value::Number(1.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    let first_generation = pipeline.exception(step).unwrap().generation;

    let scratch = pipeline.add_step(Recorder::optional("bump", &log), None).unwrap();
    pipeline.remove_step(scratch).unwrap();
    pipeline.set_socket_value(input(step), Value::Number(2.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();

    assert_eq!(pipeline.witness().records().len(), 1);
    assert!(pipeline.exception(step).unwrap().generation > first_generation);
}

/// A listener that falls behind the bus is told to re-read the witness
#[test]
fn test_lagging_listener_resyncs_from_witness() {
    let log = ExecutionLog::new();
    let failing = Arc::new(AtomicBool::new(true));
    let settings = PipelineSettings {
        event_capacity: 8,
        ..PipelineSettings::default()
    };
    let mut pipeline = Pipeline::with_settings("lagging", settings);
    let flaky = pipeline.add_step(Flaky::new("F", &log, &failing), None).unwrap();
    let chain = recorder_chain(&mut pipeline, &log, &["A", "B", "C"]);
    let mut listener = ExceptionListener::new(flaky, pipeline.bus());

    pipeline.set_socket_value(input(flaky), Value::Number(1.0)).unwrap();
    for i in 0..6 {
        pipeline
            .set_socket_value(input(chain[0]), Value::Number(i as f64))
            .unwrap();
        pipeline.run(PassTrigger::Settle).unwrap();
    }

    match listener.try_next() {
        Some(ExceptionNotice::Resync { skipped }) => assert!(skipped > 0),
        other => panic!("expected a resync notice, got {:?}", other),
    }
    // The raised notice was lost, but the witness still holds the record.
    assert!(pipeline.exception(flaky).is_some());
    assert_eq!(listener.try_next(), None);
}
