//! Execution scheduler - decides which steps a pass runs and in what order
//!
//! A pass moves through COLLECT_DIRTY, TOPO_ORDER and EXECUTE:
//!
//! 1. Collect the working set: steps with a dirty input, steps that have not
//!    run since they were added or re-enabled, and on external triggers the
//!    steps without inputs.
//! 2. Repeatedly pick the ready step with the lowest pipeline index. A step
//!    is ready when no other pending step is upstream of it.
//! 3. Execute it. Outputs that changed dirty the connected inputs, and the
//!    steps owning those inputs join the working set of the same pass.
//!
//! Every step runs at most once per pass, so a pass over an acyclic graph
//! always terminates.

use crate::core::{
    error::InternalError,
    id::StepId,
    state::{PassReport, PassTrigger},
    Pipeline,
};
use crate::event::PipelineEvent;
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, error, info, warn};

/// Run one re-evaluation pass to completion.
///
/// Every pass that publishes `PassStarted` ends with either `PassCompleted`
/// or `PassAborted`.
pub fn run_pass(pipeline: &mut Pipeline, trigger: PassTrigger) -> Result<PassReport, InternalError> {
    let mut report = PassReport::begin(pipeline.generation(), trigger);
    debug!(
        "Starting pass {} at generation {} ({:?})",
        report.pass_id, report.generation, trigger
    );
    pipeline.bus().publish(PipelineEvent::PassStarted {
        pass_id: report.pass_id,
        generation: report.generation,
    });

    if let Err(error) = execute_frontier(pipeline, trigger, &mut report) {
        error!("Pass {} aborted: {}", report.pass_id, error);
        pipeline.bus().publish(PipelineEvent::PassAborted {
            pass_id: report.pass_id,
            error: error.clone(),
        });
        return Err(error);
    }

    report.finish();
    if !report.is_noop() {
        info!(
            "Pass {} executed {} steps ({} failed)",
            report.pass_id,
            report.executed.len(),
            report.failed.len()
        );
    }
    pipeline.bus().publish(PipelineEvent::PassCompleted {
        report: report.clone(),
    });
    Ok(report)
}

fn execute_frontier(
    pipeline: &mut Pipeline,
    trigger: PassTrigger,
    report: &mut PassReport,
) -> Result<(), InternalError> {
    pipeline.check_integrity()?;

    let include_sources =
        trigger == PassTrigger::External && pipeline.settings().run_sources_on_trigger;
    let mut pending = collect_dirty(pipeline, include_sources);
    let mut done: HashSet<StepId> = HashSet::new();
    let limit = pipeline.len();

    while !pending.is_empty() {
        let Some(next) = next_ready(pipeline, &pending) else {
            let stuck: Vec<StepId> = pending.iter().copied().collect();
            warn!("No ready step among {:?}", stuck);
            return Err(InternalError::CycleDetected(stuck));
        };
        pending.remove(&next);
        done.insert(next);
        if done.len() > limit {
            return Err(InternalError::FrontierOverrun {
                executed: done.len(),
                limit,
            });
        }

        if let Some(status) = pipeline.execute_step(next) {
            report.record(next, status);
        }

        for downstream in pipeline.downstream_steps(next) {
            let dirty = pipeline
                .step(downstream)
                .is_some_and(|step| step.has_dirty_input());
            if !dirty {
                continue;
            }
            if done.contains(&downstream) {
                return Err(InternalError::CycleDetected(vec![next, downstream]));
            }
            pending.insert(downstream);
        }
    }
    Ok(())
}

/// Steps that must be considered by a pass
fn collect_dirty(pipeline: &Pipeline, include_sources: bool) -> BTreeSet<StepId> {
    pipeline
        .steps()
        .filter(|step| {
            step.has_dirty_input()
                || (step.is_enabled() && step.is_stale())
                || (include_sources && step.is_enabled() && step.is_source())
        })
        .map(|step| step.id())
        .collect()
}

/// The pending step with the lowest pipeline index that has no pending
/// step upstream of it
fn next_ready(pipeline: &Pipeline, pending: &BTreeSet<StepId>) -> Option<StepId> {
    let blocked = descendants(pipeline, pending);
    pipeline
        .step_ids()
        .iter()
        .copied()
        .find(|id| pending.contains(id) && !blocked.contains(id))
}

/// Every step reachable downstream from `roots`, excluding the roots
/// themselves unless they are reachable from another root
fn descendants(pipeline: &Pipeline, roots: &BTreeSet<StepId>) -> HashSet<StepId> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<StepId> = roots
        .iter()
        .flat_map(|root| pipeline.downstream_steps(*root))
        .collect();
    while let Some(current) = queue.pop_front() {
        if seen.insert(current) {
            queue.extend(pipeline.downstream_steps(current));
        }
    }
    seen
}
