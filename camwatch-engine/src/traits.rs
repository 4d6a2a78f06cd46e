use std::path::Path;

use async_trait::async_trait;
use camwatch_core::types::{ArtifactDescriptor, DeliveryStatus};

/// Outbound notification channel (email in production).
///
/// Implementations must be safe to retry: the queue re-attempts failed sends
/// and does not deduplicate on the recipient side.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> anyhow::Result<()>;
}

/// Durable persistence for artifacts and their notification disposition.
///
/// The in-memory session and queue tables are a cache of live state; this seam
/// is the system of record.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn record_artifact(&self, artifact: &ArtifactDescriptor) -> anyhow::Result<()>;

    async fn set_notification_status(
        &self,
        artifact_ref: &str,
        status: DeliveryStatus,
        error: Option<&str>,
    ) -> anyhow::Result<()>;
}
