//! CLI output formatting

use crate::core::{
    config::BuiltGraph,
    id::StepId,
    operation::OperationDescription,
    socket::{Socket, SocketHint},
    state::{PassReport, StepStatus},
    step::Step,
    value::Value,
};
use crate::event::PipelineEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static PAUSED: Emoji<'_, '_> = Emoji("⏸️  ", "- ");

/// Create a progress bar over a number of passes
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let progress = ProgressBar::new(total);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} passes {msg}")
    {
        progress.set_style(bar_style.progress_chars("#>-"));
    }
    progress
}

/// Format a step's status for display
pub fn format_status(step: &Step) -> String {
    if !step.is_enabled() {
        return style("DISABLED").dim().to_string();
    }
    match step.status() {
        StepStatus::Idle => style("IDLE").dim().to_string(),
        StepStatus::Succeeded => style("OK").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn status_icon(step: &Step) -> Emoji<'static, 'static> {
    if !step.is_enabled() {
        return PAUSED;
    }
    match step.status() {
        StepStatus::Succeeded => CHECK,
        StepStatus::Failed => CROSS,
        StepStatus::Idle => INFO,
    }
}

/// Format a socket value, or a dim placeholder when unset
pub fn format_value(value: Option<&Value>) -> String {
    match value {
        Some(value) => style(value.to_string()).cyan().to_string(),
        None => style("<unset>").dim().to_string(),
    }
}

fn format_socket(socket: &Socket) -> String {
    format!("{} = {}", style(socket.name()).bold(), format_value(socket.get()))
}

/// Format one step with its outputs and, if it failed, its exception
pub fn format_step(graph: &BuiltGraph, step: &Step) -> String {
    let label = graph.label_of(step.id()).unwrap_or_else(|| step.name());
    let mut lines = vec![format!(
        "{} {} ({}) {}",
        status_icon(step),
        style(label).bold(),
        style(step.name()).dim(),
        format_status(step)
    )];
    for output in step.outputs() {
        lines.push(format!("    {}", format_socket(output)));
    }
    if let Some(record) = graph.pipeline.exception(step.id()) {
        lines.push(format!("    {}", style(&record.message).red()));
    }
    lines.join("\n")
}

/// One-line pass summary
pub fn format_report(report: &PassReport) -> String {
    let elapsed = report
        .completed_at
        .signed_duration_since(report.started_at)
        .num_milliseconds();
    if report.has_failures() {
        format!(
            "{} Pass executed {} steps, {} {} ({}ms)",
            WARN,
            style(report.executed.len()).cyan(),
            style(report.failed.len()).red(),
            style("failed").red(),
            elapsed
        )
    } else {
        format!(
            "{} Pass executed {} steps ({}ms)",
            CHECK,
            style(report.executed.len()).cyan(),
            elapsed
        )
    }
}

/// Format an event for verbose display. Socket changes are left to the
/// final value listing.
pub fn format_event(graph: &BuiltGraph, event: &PipelineEvent) -> Option<String> {
    let label = |step: StepId| graph.label_of(step).map(str::to_string).unwrap_or_else(|| step.to_string());
    match event {
        PipelineEvent::Exception { origin, message, .. } => Some(format!(
            "{} {}: {}",
            CROSS,
            style(label(*origin)).red(),
            style(message).dim()
        )),
        PipelineEvent::ExceptionCleared { origin } => Some(format!(
            "{} {} recovered",
            CHECK,
            style(label(*origin)).green()
        )),
        PipelineEvent::PassCompleted { report } => Some(format_report(report)),
        PipelineEvent::PassAborted { error, .. } => Some(format!(
            "{} Pass aborted: {}",
            CROSS,
            style(error).red()
        )),
        _ => None,
    }
}

/// Format an operation description for the operation listing
pub fn format_operation(description: &OperationDescription) -> String {
    let ports = |hints: &[SocketHint]| {
        hints
            .iter()
            .map(|hint| {
                let optional = if hint.optional { "?" } else { "" };
                format!("{}{}: {}", hint.name, optional, hint.value_type)
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "  {} - {}\n      in:  ({})\n      out: ({})",
        style(&description.name).bold(),
        description.summary,
        ports(&description.inputs),
        style(ports(&description.outputs)).cyan()
    )
}

/// JSON view of every step: status, output values and exception
pub fn graph_json(graph: &BuiltGraph, reports: &[PassReport]) -> serde_json::Value {
    let steps: Vec<serde_json::Value> = graph
        .pipeline
        .steps()
        .map(|step| {
            let outputs: serde_json::Map<String, serde_json::Value> = step
                .outputs()
                .iter()
                .map(|socket| {
                    let value = socket.get().map(Value::to_json).unwrap_or(serde_json::Value::Null);
                    (socket.name().to_string(), value)
                })
                .collect();
            serde_json::json!({
                "label": graph.label_of(step.id()),
                "operation": step.name(),
                "enabled": step.is_enabled(),
                "status": step.status(),
                "outputs": outputs,
                "exception": graph.pipeline.exception(step.id()).map(|r| r.message.clone()),
            })
        })
        .collect();
    serde_json::json!({
        "name": graph.pipeline.name(),
        "generation": graph.pipeline.generation(),
        "passes": reports,
        "steps": steps,
    })
}
