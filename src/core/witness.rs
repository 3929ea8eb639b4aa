//! Exception witness: per-step failure records and their broadcast.
//!
//! A failing step never propagates its error. It reports it here instead; the
//! witness keeps the latest record per origin and publishes an
//! [`PipelineEvent::Exception`]. When the step next succeeds (or is removed)
//! the record is dropped and [`PipelineEvent::ExceptionCleared`] follows.
//! Listeners only ever compare origins, so a widget representing one step can
//! follow that step alone through an [`ExceptionListener`].

use crate::core::error::ExecutionError;
use crate::core::id::StepId;
use crate::event::{EventBus, EventSubscriber, Lagged, PipelineEvent};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Latest failure of one step
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionRecord {
    pub origin: StepId,

    /// Human-readable message
    pub message: String,

    /// Captured error, when the failure came with one
    pub error: Option<ExecutionError>,

    /// Pipeline generation at capture time
    pub generation: u64,

    pub captured_at: DateTime<Utc>,
}

/// Registry of live exception records, keyed by origin
#[derive(Debug)]
pub struct ExceptionWitness {
    records: HashMap<StepId, ExceptionRecord>,
    bus: EventBus,
}

impl ExceptionWitness {
    pub fn new(bus: EventBus) -> Self {
        Self {
            records: HashMap::new(),
            bus,
        }
    }

    /// Record (or replace) the failure of `origin` and publish it.
    pub fn report_failure(
        &mut self,
        origin: StepId,
        message: impl Into<String>,
        error: Option<ExecutionError>,
        generation: u64,
    ) {
        let message = message.into();
        warn!("{} failed: {}", origin, message);

        self.records.insert(
            origin,
            ExceptionRecord {
                origin,
                message: message.clone(),
                error: error.clone(),
                generation,
                captured_at: Utc::now(),
            },
        );
        self.bus.publish(PipelineEvent::Exception {
            origin,
            message,
            error,
        });
    }

    /// Drop the record of `origin`. Publishes only if there was one.
    pub fn report_cleared(&mut self, origin: StepId) {
        if self.records.remove(&origin).is_some() {
            debug!("{} exception cleared", origin);
            self.bus.publish(PipelineEvent::ExceptionCleared { origin });
        }
    }

    pub fn record(&self, origin: StepId) -> Option<&ExceptionRecord> {
        self.records.get(&origin)
    }

    /// All live records ordered by origin
    pub fn records(&self) -> Vec<&ExceptionRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by_key(|record| record.origin);
        records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Change in the exception state of one origin
#[derive(Debug, Clone, PartialEq)]
pub enum ExceptionNotice {
    Raised {
        message: String,
        error: Option<ExecutionError>,
    },
    Cleared,
    /// The listener fell behind and notices may have been lost. The current
    /// state must be re-read from [`Pipeline::exception`](crate::core::Pipeline::exception).
    Resync { skipped: u64 },
}

/// Follows the exception events of a single origin, ignoring everything else.
#[derive(Debug)]
pub struct ExceptionListener {
    origin: StepId,
    subscriber: EventSubscriber,
}

impl ExceptionListener {
    pub fn new(origin: StepId, bus: &EventBus) -> Self {
        Self {
            origin,
            subscriber: bus.subscribe(),
        }
    }

    pub fn origin(&self) -> StepId {
        self.origin
    }

    fn filter(&self, event: PipelineEvent) -> Option<ExceptionNotice> {
        match event {
            PipelineEvent::Exception {
                origin,
                message,
                error,
            } if origin == self.origin => Some(ExceptionNotice::Raised { message, error }),
            PipelineEvent::ExceptionCleared { origin } if origin == self.origin => {
                Some(ExceptionNotice::Cleared)
            }
            _ => None,
        }
    }

    /// Wait for the next notice about this origin.
    pub async fn next(&mut self) -> Option<ExceptionNotice> {
        loop {
            match self.subscriber.recv_checked().await {
                Ok(Some(event)) => {
                    if let Some(notice) = self.filter(event) {
                        return Some(notice);
                    }
                }
                Ok(None) => return None,
                Err(Lagged(skipped)) => return Some(self.resync(skipped)),
            }
        }
    }

    /// Next notice already published, if any.
    pub fn try_next(&mut self) -> Option<ExceptionNotice> {
        loop {
            match self.subscriber.try_recv_checked() {
                Ok(Some(event)) => {
                    if let Some(notice) = self.filter(event) {
                        return Some(notice);
                    }
                }
                Ok(None) => return None,
                Err(Lagged(skipped)) => return Some(self.resync(skipped)),
            }
        }
    }

    fn resync(&self, skipped: u64) -> ExceptionNotice {
        warn!("Exception listener for {} lagged, skipped {} events", self.origin, skipped);
        ExceptionNotice::Resync { skipped }
    }
}
