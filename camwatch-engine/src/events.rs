use serde::Serialize;
use tokio::sync::broadcast;

use camwatch_core::types::ArtifactDescriptor;

use crate::queue::QueueEntry;
use crate::session::SessionSnapshot;

/// Lifecycle transitions observers can watch (dashboard, logs).
///
/// Purely observational: delivery is best-effort and nothing here feeds back
/// into control flow.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    SessionStarted { session: SessionSnapshot },
    SessionStopped { artifact: ArtifactDescriptor },
    NotificationSent { entry: QueueEntry },
    NotificationFailed { entry: QueueEntry, error: String },
}

#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<Event>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Best-effort fan-out. A send with no live subscribers is not an error.
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
