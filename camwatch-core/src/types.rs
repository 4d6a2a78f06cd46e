use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraId(pub String);

impl CameraId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Camera id plus a nanosecond-resolution wall-clock token.
    ///
    /// High-resolution enough that two starts cannot share a token, even
    /// back-to-back; per-camera exclusivity serializes starts anyway.
    pub fn generate(camera: &CameraId) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self(format!("{}_{nanos}", camera.as_str()))
    }

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueEntryId(pub Uuid);

impl QueueEntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueueEntryId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Stopping,
    Completed,
    Failed,
}

impl SessionState {
    /// Live sessions hold the camera: at most one per camera at a time.
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Active | SessionState::Stopping)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// Metadata for one completed recording. Produced once, then immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub filename: String,
    pub path: PathBuf,
    pub camera_id: CameraId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Whole seconds of wall clock between start and stop, independent of the
    /// capture process's own accounting.
    pub duration_seconds: u64,
    pub size_bytes: u64,
}

impl ArtifactDescriptor {
    /// A zero size means the file could not be verified after the session
    /// closed. Degraded success, not a failure.
    pub fn degraded(&self) -> bool {
        self.size_bytes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique_per_start() {
        let camera = CameraId::new("camera01");
        let a = SessionId::generate(&camera);
        let b = SessionId::generate(&camera);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("camera01_"));
    }

    #[test]
    fn live_and_terminal_states_partition() {
        assert!(SessionState::Active.is_live());
        assert!(SessionState::Stopping.is_live());
        assert!(!SessionState::Completed.is_live());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Stopping.is_terminal());
    }
}
