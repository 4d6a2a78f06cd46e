use std::path::PathBuf;
use std::sync::Arc;

use camwatch_core::config::AppConfig;
use camwatch_core::message::{notification_body, notification_subject};
use camwatch_core::types::{ArtifactDescriptor, CameraId, SessionId};
use camwatch_engine::events::{Event, EventBroadcaster};
use camwatch_engine::queue::{DeliveryQueue, QueueEntry, QueueStats, SweepOutcome};
use camwatch_engine::sched::{SweepIntervals, SweepScheduler};
use camwatch_engine::session::{SessionError, SessionManager, SessionSnapshot};
use camwatch_engine::traits::{ArtifactStore, Notifier};
use camwatch_runtime::builder::{Components, build_components_from_config};

/// Control surface over the recorder and the delivery queue.
///
/// The request layer (HTTP, CLI) stays thin: every operation it exposes maps
/// onto one method here.
#[derive(Clone)]
pub struct AppService {
    cfg: AppConfig,
    sessions: Arc<SessionManager>,
    queue: Arc<DeliveryQueue>,
    events: EventBroadcaster,
    store: Arc<dyn ArtifactStore>,
    sweep_intervals: SweepIntervals,
}

impl AppService {
    pub fn new(cfg: AppConfig, notifier: Arc<dyn Notifier>, store: Arc<dyn ArtifactStore>) -> Self {
        let Components {
            sessions,
            queue,
            events,
            sweep_intervals,
        } = build_components_from_config(&cfg, notifier, store.clone());

        Self {
            cfg,
            sessions,
            queue,
            events,
            store,
            sweep_intervals,
        }
    }

    /// Start the periodic dispatch/retry sweeps. The caller owns the handle.
    pub fn spawn_sweeps(&self) -> SweepScheduler {
        SweepScheduler::spawn(self.queue.clone(), self.sweep_intervals)
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn start_recording(
        &self,
        camera_id: impl Into<String>,
    ) -> Result<SessionId, SessionError> {
        self.sessions.start_recording(CameraId::new(camera_id)).await
    }

    /// Stop a session: close out the capture, persist the artifact, and queue
    /// the operator notification.
    pub async fn stop_recording(
        &self,
        id: &SessionId,
    ) -> Result<ArtifactDescriptor, SessionError> {
        let artifact = self.sessions.stop_recording(id).await?;

        // Persistence and notification are follow-ups; the stop result already
        // belongs to the caller.
        if let Err(e) = self.store.record_artifact(&artifact).await {
            log::warn!("failed to persist artifact {}: {e:#}", artifact.filename);
        }

        // A degraded descriptor still gets announced, just without the
        // (missing) file attached.
        let attachment = (!artifact.degraded()).then(|| artifact.path.clone());
        self.queue
            .enqueue(
                artifact.filename.clone(),
                self.cfg.delivery.default_recipient.clone(),
                notification_subject(&artifact),
                Some(notification_body(&artifact)),
                attachment,
            )
            .await;

        Ok(artifact)
    }

    pub async fn session_status(&self, id: &SessionId) -> Option<SessionSnapshot> {
        self.sessions.status(id).await
    }

    pub async fn active_sessions(&self) -> Vec<SessionSnapshot> {
        self.sessions.active_sessions().await
    }

    /// Queue an ad-hoc notification. `recipient` falls back to the configured
    /// operator inbox.
    pub async fn enqueue_notification(
        &self,
        artifact_ref: impl Into<String>,
        recipient: Option<String>,
        subject: impl Into<String>,
        body: Option<String>,
        attachment: Option<PathBuf>,
    ) -> QueueEntry {
        let recipient =
            recipient.unwrap_or_else(|| self.cfg.delivery.default_recipient.clone());
        self.queue
            .enqueue(artifact_ref, recipient, subject, body, attachment)
            .await
    }

    pub async fn dispatch_now(&self) -> SweepOutcome {
        self.queue.dispatch_sweep().await
    }

    pub async fn retry_failed_now(&self) -> usize {
        self.queue.retry_failed_now().await
    }

    pub async fn queue_stats(&self) -> QueueStats {
        self.queue.stats().await
    }

    pub async fn queue_entries(&self) -> Vec<QueueEntry> {
        self.queue.entries().await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use camwatch_core::types::DeliveryStatus;
    use camwatch_runtime::defaults::default_app_config;
    use camwatch_runtime::history::HistoryStore;
    use camwatch_runtime::notify::MemoryNotifier;

    const RECORDER_SCRIPT: &str = "#!/bin/sh\n\
for arg in \"$@\"; do out=\"$arg\"; done\n\
printf 'frame data' > \"$out\"\n\
exec sleep 30\n";

    fn install_script(dir: &Path) -> PathBuf {
        let path = dir.join("fake-capture");
        std::fs::write(&path, RECORDER_SCRIPT).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn stop_persists_and_queues_the_alert() {
        let dir = tempfile::tempdir().unwrap();

        let mut cfg = default_app_config();
        cfg.recorder.capture_binary = install_script(dir.path()).to_string_lossy().into_owned();
        cfg.recorder.output_dir = dir.path().join("recordings");
        cfg.recorder.settle_delay_secs = 0;
        cfg.delivery.default_recipient = "ops@example.com".into();

        let notifier = Arc::new(MemoryNotifier::default());
        let store = Arc::new(HistoryStore::at_path(dir.path().join("history.json")));
        let service = AppService::new(cfg, notifier.clone(), store.clone());

        let id = service.start_recording("camera01").await.unwrap();
        assert_eq!(service.active_sessions().await.len(), 1);

        let artifact = service.stop_recording(&id).await.unwrap();
        assert_eq!(artifact.size_bytes, "frame data".len() as u64);

        // Artifact persisted through the store seam.
        let records = store.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, artifact.filename);

        // Alert queued for the configured operator inbox.
        let entries = service.queue_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].recipient, "ops@example.com");
        assert!(entries[0].subject.contains(&artifact.filename));
        assert_eq!(entries[0].attachment.as_deref(), Some(artifact.path.as_path()));

        // One dispatch pass delivers it and reconciles the store.
        assert_eq!(service.dispatch_now().await, SweepOutcome::Ran { attempted: 1 });
        assert_eq!(
            service.queue_stats().await,
            QueueStats {
                pending: 0,
                sent: 1,
                failed: 0
            }
        );
        let records = store.load().unwrap();
        assert_eq!(records[0].notification_status, Some(DeliveryStatus::Sent));

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ops@example.com");
    }

    #[tokio::test]
    async fn manual_retry_rearms_failed_alerts() {
        let dir = tempfile::tempdir().unwrap();

        let mut cfg = default_app_config();
        cfg.recorder.capture_binary = install_script(dir.path()).to_string_lossy().into_owned();
        cfg.recorder.output_dir = dir.path().join("recordings");
        cfg.recorder.settle_delay_secs = 0;

        let notifier = Arc::new(MemoryNotifier::default());
        *notifier.fail_with.lock().unwrap() = Some("smtp down".into());

        let store = Arc::new(HistoryStore::at_path(dir.path().join("history.json")));
        let service = AppService::new(cfg, notifier.clone(), store);

        service
            .enqueue_notification("a.mp4", None, "alert", None, None)
            .await;
        service.dispatch_now().await;
        assert_eq!(service.queue_stats().await.failed, 1);

        // Operator hits "retry now"; the transport has recovered.
        *notifier.fail_with.lock().unwrap() = None;
        assert_eq!(service.retry_failed_now().await, 1);
        service.dispatch_now().await;

        let stats = service.queue_stats().await;
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 0);
    }
}
