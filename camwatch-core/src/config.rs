use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub recorder: RecorderDefaults,
    pub delivery: DeliveryDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderDefaults {
    pub camera_id: String,
    pub source_uri: String,
    pub output_dir: PathBuf,

    /// Capture binary invoked per session. Tests point this at a script.
    pub capture_binary: String,
    pub segment_seconds: u32,

    /// Graceful-stop window before the supervisor escalates to a kill.
    pub graceful_stop_timeout_secs: u64,
    /// Grace period after process exit before the on-disk size is trusted.
    pub settle_delay_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDefaults {
    /// Operator inbox for recording alerts. Explicit config, never ambient env.
    pub default_recipient: String,
    pub max_retries: u32,
    pub dispatch_interval_secs: u64,
    pub retry_interval_secs: u64,
}
