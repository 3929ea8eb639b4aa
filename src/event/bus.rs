//! Publish/subscribe channel shared by the pipeline and its collaborators.

use crate::event::PipelineEvent;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use thiserror::Error;
use tracing::{trace, warn};

/// Default number of events buffered per subscriber before it lags.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A subscriber fell behind and the oldest events it had not received were
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Event subscriber lagged, skipped {0} events")]
pub struct Lagged(pub u64);

/// Cloneable handle to one pipeline's event channel.
///
/// Created once per pipeline and passed explicitly to everything that
/// publishes. Publishing never blocks and preserves the publisher's order;
/// a subscriber that falls more than `capacity` events behind skips the
/// oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: PipelineEvent) {
        trace!(?event, "publish");
        // No subscribers is fine; the event is simply dropped.
        let _ = self.sender.send(event);
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Receiving end of an [`EventBus`].
#[derive(Debug)]
pub struct EventSubscriber {
    receiver: broadcast::Receiver<PipelineEvent>,
}

impl EventSubscriber {
    /// Wait for the next event, reporting a lag instead of skipping past it.
    /// Returns `Ok(None)` once every bus handle is gone.
    pub async fn recv_checked(&mut self) -> Result<Option<PipelineEvent>, Lagged> {
        match self.receiver.recv().await {
            Ok(event) => Ok(Some(event)),
            Err(RecvError::Lagged(skipped)) => Err(Lagged(skipped)),
            Err(RecvError::Closed) => Ok(None),
        }
    }

    /// Next already published event, reporting a lag instead of skipping
    /// past it.
    pub fn try_recv_checked(&mut self) -> Result<Option<PipelineEvent>, Lagged> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Lagged(skipped)) => Err(Lagged(skipped)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => Ok(None),
        }
    }

    /// Wait for the next event. Returns `None` once every bus handle is gone.
    /// Events lost to lag are logged and skipped.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.recv_checked().await {
                Ok(event) => return event,
                Err(Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
            }
        }
    }

    /// Next already published event, if any.
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        loop {
            match self.try_recv_checked() {
                Ok(event) => return event,
                Err(Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
            }
        }
    }

    /// Every event published so far and not yet received.
    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
