use std::sync::Arc;
use std::time::Duration;

use camwatch_appcore::service::AppService;
use camwatch_runtime::defaults::default_app_config;
use camwatch_runtime::history::HistoryStore;
use camwatch_runtime::notify::LogNotifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Demo behavior: record a short clip from the configured source, stop, run
    // one dispatch pass with the log notifier, and print the results. Point
    // CAMWATCH_SOURCE_URI at a real RTSP camera (or any ffmpeg-readable input)
    // to produce a real file.

    let mut cfg = default_app_config();
    if let Ok(uri) = std::env::var("CAMWATCH_SOURCE_URI") {
        cfg.recorder.source_uri = uri;
    }
    if let Ok(dir) = std::env::var("CAMWATCH_OUTPUT_DIR") {
        cfg.recorder.output_dir = dir.into();
    }
    if let Ok(to) = std::env::var("CAMWATCH_RECIPIENT") {
        cfg.delivery.default_recipient = to;
    }

    let camera = cfg.recorder.camera_id.clone();
    let history_path = cfg.recorder.output_dir.join("history.json");

    let store = Arc::new(HistoryStore::at_path(history_path));
    let service = AppService::new(cfg, Arc::new(LogNotifier), store);

    // The periodic sweeps run for the life of the process; the demo also
    // forces one pass below so the output is immediate.
    let scheduler = service.spawn_sweeps();

    let session = service.start_recording(camera).await?;
    println!("recording session {}", session.as_str());

    tokio::time::sleep(Duration::from_secs(5)).await;

    let artifact = service.stop_recording(&session).await?;
    println!(
        "stopped: {} ({} bytes, {}s{})",
        artifact.filename,
        artifact.size_bytes,
        artifact.duration_seconds,
        if artifact.degraded() { ", degraded" } else { "" }
    );

    let outcome = service.dispatch_now().await;
    println!("dispatch: {outcome:?}");
    println!("queue stats: {:?}", service.queue_stats().await);

    scheduler.shutdown().await;
    Ok(())
}
