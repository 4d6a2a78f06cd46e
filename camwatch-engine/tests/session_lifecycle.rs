#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camwatch_capture::ProcessSupervisor;
use camwatch_core::types::{CameraId, SessionId, SessionState};
use camwatch_engine::events::{Event, EventBroadcaster};
use camwatch_engine::session::{SessionError, SessionManager, SessionManagerConfig};

// Fake capture binary: writes the output file (last argument, like the real
// command line), then records until told to stop.
const RECORDER_SCRIPT: &str = "#!/bin/sh\n\
for arg in \"$@\"; do out=\"$arg\"; done\n\
printf 'frame data' > \"$out\"\n\
exec sleep 30\n";

// Runs without ever producing an output file.
const SILENT_SCRIPT: &str = "#!/bin/sh\nexec sleep 30\n";

fn install_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-capture");
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn manager(dir: &Path, script: &str, events: EventBroadcaster) -> SessionManager {
    let binary = install_script(dir, script);
    SessionManager::new(
        SessionManagerConfig {
            source_uri: "rtsp://cam/stream".into(),
            output_dir: dir.join("recordings"),
            graceful_stop_timeout: Duration::from_secs(5),
            // Keep tests quick; production uses seconds.
            settle_delay: Duration::from_millis(50),
        },
        ProcessSupervisor::new(binary.to_string_lossy().into_owned(), 3600),
        events,
    )
}

#[tokio::test]
async fn start_stop_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(dir.path(), RECORDER_SCRIPT, EventBroadcaster::default());

    let id = mgr.start_recording(CameraId::new("camera01")).await.unwrap();

    let status = mgr.status(&id).await.unwrap();
    assert_eq!(status.state, SessionState::Active);
    assert_eq!(status.camera_id.as_str(), "camera01");
    assert!(status.filename.ends_with(".mp4"));

    let artifact = mgr.stop_recording(&id).await.unwrap();
    assert_eq!(artifact.size_bytes, "frame data".len() as u64);
    assert!(!artifact.degraded());
    assert!(artifact.duration_seconds <= 2);
    assert_eq!(artifact.path, dir.path().join("recordings").join(&artifact.filename));

    // Reaped after handoff: status is a pure read of live state.
    assert!(mgr.status(&id).await.is_none());
    assert!(mgr.active_sessions().await.is_empty());
}

#[tokio::test]
async fn second_start_for_same_camera_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(dir.path(), RECORDER_SCRIPT, EventBroadcaster::default());

    let first = mgr.start_recording(CameraId::new("camera01")).await.unwrap();
    let err = mgr
        .start_recording(CameraId::new("camera01"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Conflict(_)));

    // The existing session is untouched by the rejected start.
    assert_eq!(
        mgr.status(&first).await.unwrap().state,
        SessionState::Active
    );

    mgr.stop_recording(&first).await.unwrap();
    let second = mgr.start_recording(CameraId::new("camera01")).await.unwrap();
    mgr.stop_recording(&second).await.unwrap();
}

#[tokio::test]
async fn different_cameras_record_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(dir.path(), RECORDER_SCRIPT, EventBroadcaster::default());

    let a = mgr.start_recording(CameraId::new("camera01")).await.unwrap();
    let b = mgr.start_recording(CameraId::new("camera02")).await.unwrap();
    assert_eq!(mgr.active_sessions().await.len(), 2);

    mgr.stop_recording(&a).await.unwrap();
    mgr.stop_recording(&b).await.unwrap();
}

#[tokio::test]
async fn missing_artifact_degrades_instead_of_failing() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(dir.path(), SILENT_SCRIPT, EventBroadcaster::default());

    let id = mgr.start_recording(CameraId::new("camera01")).await.unwrap();
    let artifact = mgr.stop_recording(&id).await.unwrap();

    assert_eq!(artifact.size_bytes, 0);
    assert!(artifact.degraded());
    assert!(mgr.status(&id).await.is_none());
}

#[tokio::test]
async fn stop_of_unknown_or_reaped_session_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager(dir.path(), RECORDER_SCRIPT, EventBroadcaster::default());

    let err = mgr
        .stop_recording(&SessionId::new("camera01_123"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));

    let id = mgr.start_recording(CameraId::new("camera01")).await.unwrap();
    mgr.stop_recording(&id).await.unwrap();

    let err = mgr.stop_recording(&id).await.unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[tokio::test]
async fn unavailable_capture_binary_creates_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = SessionManager::new(
        SessionManagerConfig {
            source_uri: "rtsp://cam/stream".into(),
            output_dir: dir.path().join("recordings"),
            graceful_stop_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_millis(50),
        },
        ProcessSupervisor::new("/does/not/exist/ffmpeg", 3600),
        EventBroadcaster::default(),
    );

    let err = mgr
        .start_recording(CameraId::new("camera01"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CaptureUnavailable(_)));
    assert!(mgr.active_sessions().await.is_empty());
}

#[tokio::test]
async fn lifecycle_events_reach_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    let events = EventBroadcaster::default();
    let mut rx = events.subscribe();
    let mgr = manager(dir.path(), RECORDER_SCRIPT, events);

    let id = mgr.start_recording(CameraId::new("camera01")).await.unwrap();
    let artifact = mgr.stop_recording(&id).await.unwrap();

    match rx.recv().await.unwrap() {
        Event::SessionStarted { session } => {
            assert_eq!(session.id, id);
            assert_eq!(session.state, SessionState::Active);
        }
        other => panic!("expected SessionStarted, got {other:?}"),
    }
    match rx.recv().await.unwrap() {
        Event::SessionStopped { artifact: stopped } => {
            assert_eq!(stopped.filename, artifact.filename);
        }
        other => panic!("expected SessionStopped, got {other:?}"),
    }
}
