use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::queue::DeliveryQueue;

#[derive(Debug, Clone, Copy)]
pub struct SweepIntervals {
    pub dispatch: Duration,
    pub retry: Duration,
}

/// Owns the two periodic sweep tasks.
///
/// Overlap protection lives in the queue itself so timer-driven and
/// operator-driven sweeps share one guard.
pub struct SweepScheduler {
    shutdown: watch::Sender<bool>,
    dispatch_task: JoinHandle<()>,
    retry_task: JoinHandle<()>,
}

#[derive(Clone, Copy)]
enum SweepKind {
    Dispatch,
    Retry,
}

impl SweepScheduler {
    pub fn spawn(queue: Arc<DeliveryQueue>, intervals: SweepIntervals) -> Self {
        let (shutdown, _) = watch::channel(false);

        let dispatch_task = tokio::spawn(run_loop(
            queue.clone(),
            intervals.dispatch,
            shutdown.subscribe(),
            SweepKind::Dispatch,
        ));
        let retry_task = tokio::spawn(run_loop(
            queue,
            intervals.retry,
            shutdown.subscribe(),
            SweepKind::Retry,
        ));

        Self {
            shutdown,
            dispatch_task,
            retry_task,
        }
    }

    /// Stop ticking. A sweep already in progress runs to completion; there is
    /// no way to cancel a dispatch attempt mid-flight.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.dispatch_task.await;
        let _ = self.retry_task.await;
    }
}

async fn run_loop(
    queue: Arc<DeliveryQueue>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    kind: SweepKind,
) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // An interval's first tick completes immediately; the cadence starts one
    // full period after spawn.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => match kind {
                SweepKind::Dispatch => {
                    queue.dispatch_sweep().await;
                }
                SweepKind::Retry => {
                    queue.retry_sweep().await;
                }
            },
            _ = shutdown.changed() => return,
        }
    }
}
