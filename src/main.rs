use anyhow::{bail, Context, Result};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;
use visionflow::cli::commands::{OperationsCommand, RunCommand, ValidateCommand};
use visionflow::cli::output::*;
use visionflow::cli::{Cli, Command};
use visionflow::core::config::{BuiltGraph, Endpoint, GraphConfig};
use visionflow::core::{Direction, PassTrigger};
use visionflow::OperationRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let registry = OperationRegistry::with_builtins();

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_graph(cmd, &registry, cli.verbose)?,
        Command::Validate(cmd) => validate_graph(cmd, &registry)?,
        Command::Operations(cmd) => list_operations(cmd, &registry)?,
    }

    Ok(())
}

fn run_graph(cmd: &RunCommand, registry: &OperationRegistry, verbose: bool) -> Result<()> {
    let config = GraphConfig::from_file(&cmd.file)
        .with_context(|| format!("Failed to load graph '{}'", cmd.file))?;
    let mut graph = config.build(registry).context("Failed to build graph")?;

    if !cmd.json {
        println!(
            "{} Loaded graph: {} ({} steps)",
            INFO,
            style(graph.pipeline.name()).bold(),
            graph.pipeline.len()
        );
    }

    apply_overrides(&mut graph, &cmd.set, !cmd.json)?;

    let mut events = graph.pipeline.subscribe();
    let progress = (cmd.passes > 1 && !cmd.json).then(|| create_progress_bar(cmd.passes as u64));

    let mut reports = Vec::with_capacity(cmd.passes as usize);
    for pass in 0..cmd.passes {
        let report = graph
            .pipeline
            .run(PassTrigger::External)
            .with_context(|| format!("Pass {} aborted", pass + 1))?;
        debug!("Pass {} executed {:?}", pass + 1, report.executed);
        reports.push(report);

        if let Some(progress) = &progress {
            progress.inc(1);
        }
        for event in events.drain() {
            if verbose && !cmd.json {
                if let Some(line) = format_event(&graph, &event) {
                    match &progress {
                        Some(progress) => progress.println(line),
                        None => println!("{}", line),
                    }
                }
            }
        }
    }
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    if cmd.json {
        let json = graph_json(&graph, &reports);
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!();
        for step in graph.pipeline.steps() {
            println!("{}", format_step(&graph, step));
        }
        println!();
        if let Some(report) = reports.last() {
            println!("{}", format_report(report));
        }
    }

    if !graph.pipeline.witness().is_empty() {
        if !cmd.json {
            println!(
                "\n{} {} {}",
                CROSS,
                style(graph.pipeline.name()).bold(),
                style("has failing steps").red()
            );
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Apply `label.input=value` overrides through the command interface
fn apply_overrides(graph: &mut BuiltGraph, overrides: &[(String, String)], announce: bool) -> Result<()> {
    for (key, text) in overrides {
        let endpoint = Endpoint::parse(key)?;
        let socket = graph.resolve(&endpoint, Direction::Input)?;
        let Some(value_type) = graph.pipeline.socket(socket).map(|s| s.value_type()) else {
            bail!("Socket {} disappeared while applying overrides", endpoint);
        };
        let value = value_type
            .parse(text)
            .map_err(|reason| anyhow::anyhow!("Invalid value for '{}': {}", endpoint, reason))?;
        graph
            .pipeline
            .set_socket_value(socket, value.clone())
            .with_context(|| format!("Failed to set '{}'", endpoint))?;
        if announce {
            println!(
                "{} Override: {} = {}",
                INFO,
                style(&endpoint).cyan(),
                style(value).dim()
            );
        }
    }
    Ok(())
}

fn validate_graph(cmd: &ValidateCommand, registry: &OperationRegistry) -> Result<()> {
    println!("{} Validating graph...", INFO);

    let result = GraphConfig::from_file(&cmd.file).and_then(|config| {
        config.build(registry)?;
        Ok(config)
    });

    match result {
        Ok(config) => {
            println!("{} Graph description is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Connections: {}", style(config.connections.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

fn list_operations(cmd: &OperationsCommand, registry: &OperationRegistry) -> Result<()> {
    let descriptions = registry.descriptions();
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&descriptions)?);
        return Ok(());
    }

    println!("{} Available operations:", INFO);
    for description in &descriptions {
        println!("{}", format_operation(description));
    }
    Ok(())
}
