//! Event emitter: turns camera-pipeline events into durable records.
//!
//! Grounded in the original system's `camera_events` collection writes;
//! a write failure here is logged and swallowed rather than propagated,
//! since losing an event record must never take down the stream pipeline
//! that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::store::DocumentStore;
use crate::stream::BoundingBox;

/// Discriminated event payloads emitted by the camera stream pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    MotionDetected {
        foreground_pixels: u32,
        boxes: Vec<BoundingBox>,
    },
    CameraConnected,
    CameraDisconnected {
        reason: String,
    },
}

/// A single emitted event, ready to be persisted as a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub camera_id: String,
    #[serde(flatten)]
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    pub fn new(camera_id: String, kind: EventKind) -> Self {
        Self {
            camera_id,
            kind,
            occurred_at: Utc::now(),
        }
    }
}

/// Persists pipeline events to the `camera_events` collection of a
/// [`DocumentStore`].
pub struct EventEmitter {
    store: std::sync::Arc<dyn DocumentStore>,
}

const COLLECTION: &str = "camera_events";

impl EventEmitter {
    pub fn new(store: std::sync::Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Writes `event` to the store. Logs and returns on failure instead of
    /// propagating an error — the caller is the stream processor loop,
    /// which must keep running regardless.
    pub fn emit(&self, event: Event) {
        let doc = match serde_json::to_value(&event) {
            Ok(doc) => doc,
            Err(err) => {
                error!(error = %err, camera_id = %event.camera_id, "failed to serialize event");
                return;
            }
        };
        if let Err(err) = self.store.insert_one(COLLECTION, doc) {
            error!(error = %err, camera_id = %event.camera_id, "failed to persist event");
        }
    }

    pub fn recent_for_camera(&self, camera_id: &str, limit: usize) -> Vec<Event> {
        let filter = serde_json::json!({ "camera_id": camera_id });
        self.store
            .find(COLLECTION, &filter, limit)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|doc| serde_json::from_value(doc).ok())
            .collect()
    }
}
