//! Test: Graph descriptions - YAML graphs built from the operation registry

use visionflow::core::config::{ConfigError, Endpoint, GraphConfig};
use visionflow::core::{Direction, StructuralError, Value};
use visionflow::{OperationRegistry, PassTrigger, StepStatus};

const EDGE_PREVIEW: &str = r#"
name: "Edge preview"
steps:
  - label: board
    operation: checkerboard
    inputs:
      size: 32
      cell: 8
  - label: blur
    operation: box_blur
    inputs:
      radius: 2
  - label: mask
    operation: threshold
    inputs:
      level: 128
  - label: inverted
    operation: invert
  - label: stats
    operation: mean_intensity
connections:
  - from: board.image
    to: blur.image
  - from: blur.image
    to: mask.image
  - from: mask.image
    to: inverted.image
  - from: inverted.image
    to: stats.image
"#;

/// A described graph runs end to end through the built-in operations
#[test]
fn test_edge_preview_runs() {
    let registry = OperationRegistry::with_builtins();
    let mut graph = GraphConfig::from_yaml(EDGE_PREVIEW)
        .unwrap()
        .build(&registry)
        .unwrap();

    let report = graph.pipeline.run(PassTrigger::External).unwrap();
    assert_eq!(report.executed.len(), 5);
    assert!(!report.has_failures());
    assert!(graph
        .pipeline
        .steps()
        .all(|step| step.status() == StepStatus::Succeeded));

    let stats = graph
        .resolve(&Endpoint::parse("stats.mean").unwrap(), Direction::Output)
        .unwrap();
    let mean = graph.pipeline.value(stats).and_then(Value::as_number).unwrap();
    assert!(mean > 0.0 && mean < 255.0, "mean {}", mean);
}

/// Changing a mid-graph parameter only re-runs from that step down
#[test]
fn test_parameter_change_reruns_suffix() {
    let registry = OperationRegistry::with_builtins();
    let mut graph = GraphConfig::from_yaml(EDGE_PREVIEW)
        .unwrap()
        .build(&registry)
        .unwrap();
    graph.pipeline.run(PassTrigger::External).unwrap();

    let level = graph
        .resolve(&Endpoint::parse("mask.level").unwrap(), Direction::Input)
        .unwrap();
    graph.pipeline.set_socket_value(level, Value::Number(0.0)).unwrap();
    let report = graph.pipeline.run(PassTrigger::Settle).unwrap();

    let labels: Vec<&str> = report
        .executed
        .iter()
        .filter_map(|step| graph.label_of(*step))
        .collect();
    assert_eq!(labels, vec!["mask", "inverted", "stats"]);

    // Level 0 keeps every pixel, so the inverted mask is black.
    let stats = graph
        .resolve(&Endpoint::parse("stats.mean").unwrap(), Direction::Output)
        .unwrap();
    assert_eq!(graph.pipeline.value(stats), Some(&Value::Number(0.0)));
}

/// A description whose connections close a loop is refused by the pipeline
#[test]
fn test_cyclic_description_rejected() {
    let yaml = r#"
name: loop
steps:
  - label: a
    operation: invert
  - label: b
    operation: invert
connections:
  - from: a.image
    to: b.image
  - from: b.image
    to: a.image
"#;
    let config = GraphConfig::from_yaml(yaml).unwrap();
    let result = config.build(&OperationRegistry::with_builtins());
    assert!(matches!(
        result,
        Err(ConfigError::Structural {
            source: StructuralError::Cycle { .. },
            ..
        })
    ));
}

/// Literal values must parse as the input's type
#[test]
fn test_bad_literal_rejected() {
    let yaml = r#"
name: bad
steps:
  - label: s
    operation: scale
    inputs:
      value: "lots"
"#;
    let config = GraphConfig::from_yaml(yaml).unwrap();
    assert!(matches!(
        config.validate(&OperationRegistry::with_builtins()),
        Err(ConfigError::InvalidValue { socket, .. }) if socket == "value"
    ));
}

#[test]
fn test_graph_file_round_trip_through_disk() {
    let path = std::env::temp_dir().join(format!("visionflow-{}.yaml", uuid::Uuid::new_v4()));
    std::fs::write(&path, EDGE_PREVIEW).unwrap();

    let config = GraphConfig::from_file(&path).unwrap();
    assert_eq!(config.name, "Edge preview");
    assert_eq!(config.steps.len(), 5);
    assert_eq!(config.connections.len(), 4);

    std::fs::remove_file(&path).ok();
    assert!(matches!(GraphConfig::from_file(&path), Err(ConfigError::Io(_))));
}
