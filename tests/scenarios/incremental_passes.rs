//! Test: Incremental passes - only what changed is recomputed, in dependency order

use crate::helpers::*;
use visionflow::core::Value;
use visionflow::operations::math::Add;
use visionflow::{PassTrigger, Pipeline, PipelineEvent};

/// A -> B -> C: one input change runs each step exactly once, in order
#[test]
fn test_linear_chain_runs_once_in_order() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("chain");
    let steps = recorder_chain(&mut pipeline, &log, &["A", "B", "C"]);

    pipeline.set_socket_value(input(steps[0]), Value::Number(1.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    assert_executed(&log, &["A", "B", "C"]);
    assert_eq!(number(&pipeline, output(steps[2])), Some(4.0));

    log.take();
    pipeline.set_socket_value(input(steps[0]), Value::Number(5.0)).unwrap();
    let report = pipeline.run(PassTrigger::Settle).unwrap();

    assert_executed(&log, &["A", "B", "C"]);
    assert_eq!(report.executed, steps);
    assert_eq!(number(&pipeline, output(steps[2])), Some(8.0));
}

/// A pass over a settled pipeline executes nothing
#[test]
fn test_settled_pipeline_is_idempotent() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("settled");
    let steps = recorder_chain(&mut pipeline, &log, &["A", "B"]);
    pipeline.set_socket_value(input(steps[0]), Value::Number(1.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    log.take();

    assert!(pipeline.run(PassTrigger::Settle).unwrap().is_noop());
    // Recorders have inputs, so an external trigger has no sources to re-run.
    assert!(pipeline.run(PassTrigger::External).unwrap().is_noop());
    assert!(log.entries().is_empty());
}

/// Writing the value a socket already holds does not dirty it
#[test]
fn test_equal_value_does_not_rerun() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("equal");
    let steps = recorder_chain(&mut pipeline, &log, &["A", "B"]);
    pipeline.set_socket_value(input(steps[0]), Value::Number(2.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    log.take();

    pipeline.set_socket_value(input(steps[0]), Value::Number(2.0)).unwrap();
    assert!(pipeline.run(PassTrigger::Settle).unwrap().is_noop());
}

/// Dependencies win over pipeline order; order only breaks ties
#[test]
fn test_dependency_order_beats_pipeline_order() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("reordered");
    let c = pipeline.add_step(Recorder::new("C", &log), None).unwrap();
    let b = pipeline.add_step(Recorder::new("B", &log), Some(0)).unwrap();
    let a = pipeline.add_step(Recorder::new("A", &log), Some(0)).unwrap();
    let free = pipeline.add_step(Recorder::optional("free", &log), Some(0)).unwrap();
    assert_eq!(pipeline.step_ids(), &[free, a, b, c]);

    pipeline.connect(output(b), input(c)).unwrap();
    pipeline.connect(output(a), input(b)).unwrap();
    pipeline.move_step(c, 0).unwrap();
    pipeline.set_socket_value(input(a), Value::Number(0.0)).unwrap();

    pipeline.run(PassTrigger::Settle).unwrap();
    assert_executed(&log, &["free", "A", "B", "C"]);
}

/// A join runs once, after both of its branches
#[test]
fn test_diamond_join_runs_once() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("diamond");
    let a = pipeline.add_step(Recorder::new("A", &log), None).unwrap();
    let b = pipeline.add_step(Recorder::new("B", &log), None).unwrap();
    let c = pipeline.add_step(Recorder::new("C", &log), None).unwrap();
    let d = pipeline.add_step(Box::new(Add::new()), None).unwrap();
    pipeline.connect(output(a), input(b)).unwrap();
    pipeline.connect(output(a), input(c)).unwrap();
    pipeline.connect(output(b), input(d)).unwrap();
    pipeline
        .connect(output(c), visionflow::SocketId::input(d, 1))
        .unwrap();

    pipeline.set_socket_value(input(a), Value::Number(1.0)).unwrap();
    let report = pipeline.run(PassTrigger::Settle).unwrap();

    assert_eq!(report.executed, vec![a, b, c, d]);
    assert_eq!(number(&pipeline, output(d)), Some(6.0));

    pipeline.set_socket_value(input(a), Value::Number(2.0)).unwrap();
    let report = pipeline.run(PassTrigger::Settle).unwrap();
    assert_eq!(report.executed.iter().filter(|s| **s == d).count(), 1);
    assert_eq!(number(&pipeline, output(d)), Some(8.0));
}

/// Only steps downstream of a change re-run
#[test]
fn test_independent_branch_is_untouched() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("branches");
    let left = recorder_chain(&mut pipeline, &log, &["L1", "L2"]);
    let right = recorder_chain(&mut pipeline, &log, &["R1", "R2"]);
    pipeline.set_socket_value(input(left[0]), Value::Number(1.0)).unwrap();
    pipeline.set_socket_value(input(right[0]), Value::Number(1.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    log.take();

    pipeline.set_socket_value(input(right[0]), Value::Number(9.0)).unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();

    assert_executed(&log, &["R1", "R2"]);
    assert_eq!(number(&pipeline, output(left[1])), Some(3.0));
    assert_eq!(number(&pipeline, output(right[1])), Some(11.0));
}

/// An output that recomputes to the same value stops propagation there
#[test]
fn test_unchanged_output_stops_propagation() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("cutoff");
    let scale = pipeline
        .add_step(Box::new(visionflow::operations::math::Scale::new()), None)
        .unwrap();
    let tail = pipeline.add_step(Recorder::new("tail", &log), None).unwrap();
    pipeline.connect(output(scale), input(tail)).unwrap();
    pipeline.set_socket_value(input(scale), Value::Number(0.0)).unwrap();
    pipeline
        .set_socket_value(visionflow::SocketId::input(scale, 1), Value::Number(3.0))
        .unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    log.take();

    // 0 * 5 is still 0, so the tail has nothing new to consume.
    pipeline
        .set_socket_value(visionflow::SocketId::input(scale, 1), Value::Number(5.0))
        .unwrap();
    let report = pipeline.run(PassTrigger::Settle).unwrap();

    assert_eq!(report.executed, vec![scale]);
    assert!(log.entries().is_empty());
}

/// Re-sending NaN is not a change, so a settled step stays settled
#[test]
fn test_repeated_nan_does_not_rerun() {
    let log = ExecutionLog::new();
    let mut pipeline = Pipeline::new("nan");
    let steps = recorder_chain(&mut pipeline, &log, &["A", "B"]);
    pipeline
        .set_socket_value(input(steps[0]), Value::Number(f64::NAN))
        .unwrap();
    pipeline.run(PassTrigger::Settle).unwrap();
    assert!(number(&pipeline, output(steps[1])).is_some_and(f64::is_nan));
    log.take();

    let mut events = pipeline.subscribe();
    pipeline
        .set_socket_value(input(steps[0]), Value::Number(f64::NAN))
        .unwrap();
    let report = pipeline.run(PassTrigger::Settle).unwrap();

    assert!(report.is_noop());
    assert!(log.entries().is_empty());
    assert!(!drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, PipelineEvent::SocketChanged { .. })));
}
