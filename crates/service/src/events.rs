//! Ingestion progress events.
//!
//! Published on a broadcast channel. Sending with no subscriber is not an
//! error and never changes an ingestion result.

use notescan_vision::{ProgressObserver, RecognitionProgress};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Buffered events per subscriber before it starts lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IngestEvent {
    FileStarted {
        batch_id: Uuid,
        filename: String,
        index: usize,
        total: usize,
    },
    Recognition {
        batch_id: Uuid,
        filename: String,
        status: String,
        progress: f32,
    },
    FileCompleted {
        batch_id: Uuid,
        filename: String,
        found: usize,
        inserted: usize,
        duplicates: usize,
    },
    FileFailed {
        batch_id: Uuid,
        filename: String,
        error: String,
    },
    BatchCompleted {
        batch_id: Uuid,
        files: usize,
        failed: usize,
        total_candidates: usize,
        inserted: usize,
        duplicates: usize,
    },
}

/// Cloneable publisher handle.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IngestEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IngestEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: IngestEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}

/// Forwards recognizer progress for one file onto the bus.
pub(crate) struct FileProgress<'a> {
    pub bus: &'a EventBus,
    pub batch_id: Uuid,
    pub filename: &'a str,
}

impl ProgressObserver for FileProgress<'_> {
    fn on_progress(&self, progress: RecognitionProgress) {
        tracing::debug!(
            filename = %self.filename,
            status = %progress.status,
            progress = progress.progress,
            "recognition progress"
        );
        self.bus.publish(IngestEvent::Recognition {
            batch_id: self.batch_id,
            filename: self.filename.to_owned(),
            status: progress.status,
            progress: progress.progress,
        });
    }
}
