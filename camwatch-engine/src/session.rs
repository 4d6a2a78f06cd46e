use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use camwatch_capture::{CaptureError, CaptureProcess, ProcessSupervisor};
use camwatch_core::naming::artifact_filename;
use camwatch_core::types::{ArtifactDescriptor, CameraId, SessionId, SessionState};

use crate::events::{Event, EventBroadcaster};

#[derive(Debug, Error)]
pub enum SessionError {
    /// The capture subprocess could not be started; no session was created.
    #[error("capture engine unavailable: {0}")]
    CaptureUnavailable(#[from] CaptureError),

    /// The camera already has a live (Active or Stopping) session.
    #[error("camera {0} already has a live session")]
    Conflict(String),

    /// Unknown or already-reaped session id. "Nothing to do", not a fault.
    #[error("session not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    pub source_uri: String,
    pub output_dir: PathBuf,

    /// Graceful-stop window before the supervisor escalates to a kill.
    pub graceful_stop_timeout: Duration,
    /// Grace period after process exit before the on-disk size is trusted.
    pub settle_delay: Duration,
}

/// One in-flight recording. Owned exclusively by the manager's table and
/// dropped from it once the terminal result is handed to the stop caller.
struct RecordingSession {
    id: SessionId,
    camera_id: CameraId,
    state: SessionState,
    start_time: DateTime<Utc>,
    filename: String,
    artifact_path: PathBuf,

    // Present only while Active. Claimed by the stop caller for the duration
    // of the shutdown sequence.
    process: Option<CaptureProcess>,
}

/// Client-facing view of a live session: no process handle, always cloneable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub camera_id: CameraId,
    pub state: SessionState,
    pub start_time: DateTime<Utc>,
    pub filename: String,
    pub artifact_path: PathBuf,
}

fn snapshot_of(session: &RecordingSession) -> SessionSnapshot {
    SessionSnapshot {
        id: session.id.clone(),
        camera_id: session.camera_id.clone(),
        state: session.state,
        start_time: session.start_time,
        filename: session.filename.clone(),
        artifact_path: session.artifact_path.clone(),
    }
}

/// Owns the table of in-flight recording sessions.
pub struct SessionManager {
    cfg: SessionManagerConfig,
    supervisor: ProcessSupervisor,
    sessions: Mutex<HashMap<String, RecordingSession>>,
    events: EventBroadcaster,
}

impl SessionManager {
    pub fn new(
        cfg: SessionManagerConfig,
        supervisor: ProcessSupervisor,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            cfg,
            supervisor,
            sessions: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Start a new session for `camera_id`.
    ///
    /// Rejected with `Conflict` while the camera already has a live session;
    /// the existing session is left untouched.
    pub async fn start_recording(&self, camera_id: CameraId) -> Result<SessionId, SessionError> {
        // Best-effort; a real failure surfaces through the spawn below.
        if let Err(e) = tokio::fs::create_dir_all(&self.cfg.output_dir).await {
            log::warn!(
                "failed to create output dir {}: {e}",
                self.cfg.output_dir.display()
            );
        }

        let mut sessions = self.sessions.lock().await;

        if sessions
            .values()
            .any(|s| s.camera_id == camera_id && s.state.is_live())
        {
            return Err(SessionError::Conflict(camera_id.as_str().to_string()));
        }

        let start_time = Utc::now();
        let filename = artifact_filename(Local::now().naive_local());
        let artifact_path = self.cfg.output_dir.join(&filename);

        let process = self.supervisor.spawn(&self.cfg.source_uri, &artifact_path)?;

        let id = SessionId::generate(&camera_id);
        log::info!(
            "session {} started for camera {} -> {}",
            id.as_str(),
            camera_id.as_str(),
            artifact_path.display()
        );

        let session = RecordingSession {
            id: id.clone(),
            camera_id,
            state: SessionState::Active,
            start_time,
            filename,
            artifact_path,
            process: Some(process),
        };
        let snapshot = snapshot_of(&session);
        sessions.insert(id.as_str().to_string(), session);
        drop(sessions);

        self.events.emit(Event::SessionStarted { session: snapshot });
        Ok(id)
    }

    /// Stop a session and close it out.
    ///
    /// Always produces a descriptor once the session is found: if the artifact
    /// file cannot be verified after the settle delay, the descriptor comes
    /// back degraded (`size_bytes == 0`) instead of failing the stop.
    pub async fn stop_recording(
        &self,
        id: &SessionId,
    ) -> Result<ArtifactDescriptor, SessionError> {
        // Claim the session under the lock, then run the slow shutdown
        // sequence without it so other cameras stay responsive.
        let (mut process, camera_id, start_time, filename, artifact_path) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(id.as_str())
                .ok_or_else(|| SessionError::NotFound(id.as_str().to_string()))?;

            // Stopping means another caller already owns the terminal result.
            if session.state != SessionState::Active {
                return Err(SessionError::NotFound(id.as_str().to_string()));
            }
            let Some(process) = session.process.take() else {
                return Err(SessionError::NotFound(id.as_str().to_string()));
            };
            session.state = SessionState::Stopping;

            (
                process,
                session.camera_id.clone(),
                session.start_time,
                session.filename.clone(),
                session.artifact_path.clone(),
            )
        };

        match process.stop(self.cfg.graceful_stop_timeout).await {
            Ok(exit) => log::info!(
                "capture for session {} exited {:?} (code {:?}) after {:?}",
                id.as_str(),
                exit.outcome,
                exit.exit_code,
                exit.waited
            ),
            // The stop must still close out; a wait error leaves us with
            // whatever is on disk.
            Err(e) => log::error!("capture stop for session {} failed: {e}", id.as_str()),
        }

        // The container needs a moment after exit before its size is final.
        tokio::time::sleep(self.cfg.settle_delay).await;

        let end_time = Utc::now();
        let duration_seconds = (end_time - start_time).num_seconds().max(0) as u64;

        let size_bytes = match tokio::fs::metadata(&artifact_path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::warn!(
                    "recording file not found after stop: {} ({e})",
                    artifact_path.display()
                );
                0
            }
        };

        {
            // Terminal: the result belongs to the caller now; durable history
            // is the external store's job.
            let mut sessions = self.sessions.lock().await;
            sessions.remove(id.as_str());
        }

        let artifact = ArtifactDescriptor {
            filename,
            path: artifact_path,
            camera_id,
            start_time,
            end_time,
            duration_seconds,
            size_bytes,
        };

        log::info!(
            "session {} closed: {} ({} bytes, {}s)",
            id.as_str(),
            artifact.filename,
            artifact.size_bytes,
            artifact.duration_seconds
        );
        self.events.emit(Event::SessionStopped {
            artifact: artifact.clone(),
        });
        Ok(artifact)
    }

    /// Pure read of current in-memory state; reaped sessions are not found.
    pub async fn status(&self, id: &SessionId) -> Option<SessionSnapshot> {
        let sessions = self.sessions.lock().await;
        sessions.get(id.as_str()).map(snapshot_of)
    }

    pub async fn active_sessions(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.lock().await;
        let mut live: Vec<SessionSnapshot> = sessions
            .values()
            .filter(|s| s.state.is_live())
            .map(snapshot_of)
            .collect();
        live.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        live
    }
}
