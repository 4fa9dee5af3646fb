//! Camera stream pipeline: per-camera capture/process thread pairs plus
//! motion detection, fronted by a registry keyed on camera id.

pub mod motion;
pub mod session;

pub use motion::{BoundingBox, MotionResult};
pub use session::{CaptureSource, StreamSession, StreamStatsSnapshot, SyntheticSource};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::CameraConfig;
use crate::error::{CoreError, Result};
use crate::event_emitter::EventEmitter;

/// Owns every active [`StreamSession`], keyed by camera id.
pub struct StreamManager {
    config: CameraConfig,
    event_emitter: Arc<EventEmitter>,
    sessions: Mutex<HashMap<String, StreamSession>>,
}

impl StreamManager {
    pub fn new(config: CameraConfig, event_emitter: Arc<EventEmitter>) -> Self {
        Self {
            config,
            event_emitter,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Starts capture/process threads for `camera_id` using `source`.
    /// Replaces and stops any existing session under the same id.
    pub fn register(&self, camera_id: impl Into<String>, source: Box<dyn CaptureSource>) {
        let camera_id = camera_id.into();
        let mut session = StreamSession::new(camera_id.clone(), self.config);
        session.start(source, self.event_emitter.clone());
        let mut sessions = self.sessions.lock();
        if let Some(mut previous) = sessions.insert(camera_id, session) {
            previous.stop();
        }
    }

    pub fn stop_camera(&self, camera_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock();
        let mut session = sessions
            .remove(camera_id)
            .ok_or_else(|| CoreError::NotFound(camera_id.to_string()))?;
        session.stop();
        Ok(())
    }

    pub fn stats(&self, camera_id: &str) -> Result<StreamStatsSnapshot> {
        let sessions = self.sessions.lock();
        sessions
            .get(camera_id)
            .map(|s| s.stats())
            .ok_or_else(|| CoreError::NotFound(camera_id.to_string()))
    }

    pub fn all_stats(&self) -> HashMap<String, StreamStatsSnapshot> {
        self.sessions
            .lock()
            .iter()
            .map(|(id, session)| (id.clone(), session.stats()))
            .collect()
    }

    pub fn latest_snapshot(&self, camera_id: &str) -> Result<Vec<u8>> {
        let sessions = self.sessions.lock();
        let session = sessions
            .get(camera_id)
            .ok_or_else(|| CoreError::NotFound(camera_id.to_string()))?;
        session
            .latest_snapshot()
            .ok_or_else(|| CoreError::NotFound(format!("{camera_id}: no snapshot yet")))
    }

    pub fn camera_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    include!("mod_test.rs");
}
