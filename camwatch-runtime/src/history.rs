use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use camwatch_core::types::{ArtifactDescriptor, DeliveryStatus};
use camwatch_engine::traits::ArtifactStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub filename: String,
    pub path: PathBuf,
    pub camera_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub size_bytes: u64,

    pub notification_status: Option<DeliveryStatus>,
    pub notification_error: Option<String>,
}

impl HistoryRecord {
    pub fn from_artifact(artifact: &ArtifactDescriptor) -> Self {
        Self {
            filename: artifact.filename.clone(),
            path: artifact.path.clone(),
            camera_id: artifact.camera_id.as_str().to_string(),
            start_time: artifact.start_time,
            end_time: artifact.end_time,
            duration_seconds: artifact.duration_seconds,
            size_bytes: artifact.size_bytes,
            notification_status: None,
            notification_error: None,
        }
    }
}

/// Bounded JSON record of completed recordings and their notification
/// disposition. Stands in for the external durable store at the
/// `ArtifactStore` seam.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,

    // Serializes read-modify-write cycles across concurrent callers.
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_entries: 200,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<Vec<HistoryRecord>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read history: {}", self.path.display()))?;
        let records: Vec<HistoryRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse history: {}", self.path.display()))?;
        Ok(records)
    }

    pub fn append(&self, record: HistoryRecord) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().unwrap();

        let mut records = self.load()?;
        records.push(record);
        if records.len() > self.max_entries {
            let start = records.len() - self.max_entries;
            records = records.split_off(start);
        }

        self.write(&records)
    }

    /// Update the notification disposition of the record for `artifact_ref`
    /// (keyed by filename). A missing record is not an error: the queue's
    /// back-reference is a relation, not ownership.
    pub fn set_status(
        &self,
        artifact_ref: &str,
        status: DeliveryStatus,
        error: Option<&str>,
    ) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().unwrap();

        let mut records = self.load()?;
        let Some(record) = records.iter_mut().find(|r| r.filename == artifact_ref) else {
            log::debug!("no history record for {artifact_ref}; skipping status update");
            return Ok(());
        };

        record.notification_status = Some(status);
        record.notification_error = error.map(str::to_string);
        self.write(&records)
    }

    fn write(&self, records: &[HistoryRecord]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create dir: {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(records)?)
            .with_context(|| format!("failed to write history temp: {}", tmp.display()))?;
        crate::config_store::replace_file(&tmp, &self.path)
            .with_context(|| format!("failed to replace history: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ArtifactStore for HistoryStore {
    async fn record_artifact(&self, artifact: &ArtifactDescriptor) -> anyhow::Result<()> {
        self.append(HistoryRecord::from_artifact(artifact))
    }

    async fn set_notification_status(
        &self,
        artifact_ref: &str,
        status: DeliveryStatus,
        error: Option<&str>,
    ) -> anyhow::Result<()> {
        self.set_status(artifact_ref, status, error)
    }
}
