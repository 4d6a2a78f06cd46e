use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use camwatch_core::types::{DeliveryStatus, QueueEntryId};

use crate::events::{Event, EventBroadcaster};
use crate::traits::{ArtifactStore, Notifier};

#[derive(Debug, Clone)]
pub struct DeliveryQueueConfig {
    /// Dispatch attempts per entry before it is left permanently Failed.
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,

    /// Relation to the artifact being announced. Relation only: the artifact's
    /// lifecycle is independent of the queue's.
    pub artifact_ref: String,

    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,

    pub status: DeliveryStatus,
    pub retry_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    /// Last failure reason; present only while Failed.
    pub error_detail: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// A sweep was already in flight; this invocation did nothing at all.
    Skipped,
    /// The sweep ran and dispatched `attempted` entries.
    Ran { attempted: usize },
}

/// Owns the table of notification entries and their dispatch lifecycle.
///
/// Entries are appended, never removed; final disposition is the durable
/// store's concern.
pub struct DeliveryQueue {
    cfg: DeliveryQueueConfig,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn ArtifactStore>,
    events: EventBroadcaster,

    // Insertion order is dispatch order.
    entries: Mutex<Vec<QueueEntry>>,
    sweep_in_flight: AtomicBool,
}

impl DeliveryQueue {
    pub fn new(
        cfg: DeliveryQueueConfig,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn ArtifactStore>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            cfg,
            notifier,
            store,
            events,
            entries: Mutex::new(Vec::new()),
            sweep_in_flight: AtomicBool::new(false),
        }
    }

    /// Pure append; always succeeds.
    pub async fn enqueue(
        &self,
        artifact_ref: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: Option<String>,
        attachment: Option<PathBuf>,
    ) -> QueueEntry {
        let entry = QueueEntry {
            id: QueueEntryId::new(),
            artifact_ref: artifact_ref.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.unwrap_or_default(),
            attachment,
            status: DeliveryStatus::Pending,
            retry_count: 0,
            last_attempt: None,
            error_detail: None,
            enqueued_at: Utc::now(),
        };

        self.entries.lock().await.push(entry.clone());
        log::info!(
            "queued notification for {} to {}",
            entry.artifact_ref,
            entry.recipient
        );
        entry
    }

    /// One pass over Pending entries, in insertion order.
    ///
    /// Slow deliveries throttle sweep frequency instead of stacking up: while
    /// a sweep is in flight, further invocations are dropped, not queued.
    pub async fn dispatch_sweep(&self) -> SweepOutcome {
        if self
            .sweep_in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            log::debug!("dispatch sweep already in flight; skipping");
            return SweepOutcome::Skipped;
        }

        let attempted = self.run_dispatch().await;

        self.sweep_in_flight.store(false, Ordering::Release);
        SweepOutcome::Ran { attempted }
    }

    async fn run_dispatch(&self) -> usize {
        let pending: Vec<QueueEntry> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .filter(|e| e.status == DeliveryStatus::Pending)
                .cloned()
                .collect()
        };

        // One entry's failure never aborts the rest of the sweep.
        for entry in &pending {
            let sent = self
                .notifier
                .send(
                    &entry.recipient,
                    &entry.subject,
                    &entry.body,
                    entry.attachment.as_deref(),
                )
                .await;

            match sent {
                Ok(()) => self.mark_sent(&entry.id).await,
                Err(e) => self.mark_failed(&entry.id, format!("{e:#}")).await,
            }
        }

        pending.len()
    }

    async fn mark_sent(&self, id: &QueueEntryId) {
        let updated = {
            let mut entries = self.entries.lock().await;
            entries.iter_mut().find(|e| e.id == *id).map(|e| {
                e.status = DeliveryStatus::Sent;
                e.last_attempt = Some(Utc::now());
                e.error_detail = None;
                e.clone()
            })
        };
        let Some(entry) = updated else { return };

        log::info!(
            "notification sent for {} to {}",
            entry.artifact_ref,
            entry.recipient
        );

        if let Err(e) = self
            .store
            .set_notification_status(&entry.artifact_ref, DeliveryStatus::Sent, None)
            .await
        {
            log::warn!("failed to persist sent status for {}: {e:#}", entry.artifact_ref);
        }
        self.events.emit(Event::NotificationSent { entry });
    }

    async fn mark_failed(&self, id: &QueueEntryId, error: String) {
        let updated = {
            let mut entries = self.entries.lock().await;
            entries.iter_mut().find(|e| e.id == *id).map(|e| {
                e.status = DeliveryStatus::Failed;
                e.retry_count += 1;
                e.last_attempt = Some(Utc::now());
                e.error_detail = Some(error.clone());
                e.clone()
            })
        };
        let Some(entry) = updated else { return };

        log::warn!(
            "notification for {} to {} failed (attempt {}): {error}",
            entry.artifact_ref,
            entry.recipient,
            entry.retry_count
        );

        if let Err(e) = self
            .store
            .set_notification_status(&entry.artifact_ref, DeliveryStatus::Failed, Some(&error))
            .await
        {
            log::warn!(
                "failed to persist failed status for {}: {e:#}",
                entry.artifact_ref
            );
        }
        self.events.emit(Event::NotificationFailed { entry, error });
    }

    /// Re-arm Failed entries still under the retry budget. Entries at or past
    /// the budget are left untouched, permanently Failed and visible in stats.
    pub async fn retry_sweep(&self) -> usize {
        let rearmed: Vec<QueueEntry> = {
            let mut entries = self.entries.lock().await;
            let mut out = Vec::new();
            for e in entries.iter_mut() {
                if e.status == DeliveryStatus::Failed && e.retry_count < self.cfg.max_retries {
                    e.status = DeliveryStatus::Pending;
                    e.error_detail = None;
                    out.push(e.clone());
                }
            }
            out
        };

        for entry in &rearmed {
            if let Err(e) = self
                .store
                .set_notification_status(&entry.artifact_ref, DeliveryStatus::Pending, None)
                .await
            {
                log::warn!(
                    "failed to persist pending status for {}: {e:#}",
                    entry.artifact_ref
                );
            }
        }

        if !rearmed.is_empty() {
            log::info!("re-armed {} failed notification(s) for retry", rearmed.len());
        }
        rearmed.len()
    }

    /// Operator-initiated "retry now": exactly the retry sweep, synchronously.
    pub async fn retry_failed_now(&self) -> usize {
        self.retry_sweep().await
    }

    /// Counts computed from queue entries alone; the queue is the single
    /// source of truth for all three.
    pub async fn stats(&self) -> QueueStats {
        let entries = self.entries.lock().await;
        let mut stats = QueueStats::default();
        for e in entries.iter() {
            match e.status {
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Sent => stats.sent += 1,
                DeliveryStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub async fn entries(&self) -> Vec<QueueEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn entry(&self, id: &QueueEntryId) -> Option<QueueEntry> {
        self.entries.lock().await.iter().find(|e| e.id == *id).cloned()
    }
}
