//! Execution state models

use crate::core::id::StepId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of the most recent execution of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// Step has not executed since it was added
    Idle,
    /// Last execution succeeded
    Succeeded,
    /// Last execution failed; an exception record exists for the step
    Failed,
}

impl StepStatus {
    pub fn has_run(&self) -> bool {
        !matches!(self, StepStatus::Idle)
    }
}

/// Which steps a pass considers beyond those with dirty inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassTrigger {
    /// Only settle dirty and never-run steps
    Settle,
    /// Externally requested pass; steps without inputs also run
    External,
}

/// Summary of one re-evaluation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    /// Unique pass ID
    pub pass_id: Uuid,

    /// Pipeline generation the pass ran against
    pub generation: u64,

    pub trigger: PassTrigger,

    /// Steps in the order they executed
    pub executed: Vec<StepId>,

    /// Subset of `executed` that succeeded
    pub succeeded: Vec<StepId>,

    /// Subset of `executed` that failed
    pub failed: Vec<StepId>,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl PassReport {
    pub(crate) fn begin(generation: u64, trigger: PassTrigger) -> Self {
        let now = Utc::now();
        Self {
            pass_id: Uuid::new_v4(),
            generation,
            trigger,
            executed: Vec::new(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            started_at: now,
            completed_at: now,
        }
    }

    pub(crate) fn record(&mut self, step: StepId, status: StepStatus) {
        self.executed.push(step);
        match status {
            StepStatus::Succeeded => self.succeeded.push(step),
            StepStatus::Failed => self.failed.push(step),
            StepStatus::Idle => {}
        }
    }

    pub(crate) fn finish(&mut self) {
        self.completed_at = Utc::now();
    }

    /// Whether nothing had to be recomputed
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
