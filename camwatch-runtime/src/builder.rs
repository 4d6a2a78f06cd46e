use std::sync::Arc;
use std::time::Duration;

use camwatch_capture::ProcessSupervisor;
use camwatch_core::config::AppConfig;
use camwatch_engine::events::EventBroadcaster;
use camwatch_engine::queue::{DeliveryQueue, DeliveryQueueConfig};
use camwatch_engine::sched::SweepIntervals;
use camwatch_engine::session::{SessionManager, SessionManagerConfig};
use camwatch_engine::traits::{ArtifactStore, Notifier};

pub struct Components {
    pub sessions: Arc<SessionManager>,
    pub queue: Arc<DeliveryQueue>,
    pub events: EventBroadcaster,
    pub sweep_intervals: SweepIntervals,
}

/// Assemble engine components from config + capability implementations.
///
/// This keeps the request layer thin.
pub fn build_components_from_config(
    cfg: &AppConfig,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn ArtifactStore>,
) -> Components {
    let events = EventBroadcaster::default();

    let supervisor = ProcessSupervisor::new(
        cfg.recorder.capture_binary.clone(),
        cfg.recorder.segment_seconds,
    );

    let sessions = Arc::new(SessionManager::new(
        SessionManagerConfig {
            source_uri: cfg.recorder.source_uri.clone(),
            output_dir: cfg.recorder.output_dir.clone(),
            graceful_stop_timeout: Duration::from_secs(cfg.recorder.graceful_stop_timeout_secs),
            settle_delay: Duration::from_secs(cfg.recorder.settle_delay_secs),
        },
        supervisor,
        events.clone(),
    ));

    let queue = Arc::new(DeliveryQueue::new(
        DeliveryQueueConfig {
            max_retries: cfg.delivery.max_retries,
        },
        notifier,
        store,
        events.clone(),
    ));

    Components {
        sessions,
        queue,
        events,
        sweep_intervals: SweepIntervals {
            dispatch: Duration::from_secs(cfg.delivery.dispatch_interval_secs),
            retry: Duration::from_secs(cfg.delivery.retry_interval_secs),
        },
    }
}
