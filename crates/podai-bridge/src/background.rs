//! Background tasks for the bridge.
//!
//! Includes:
//! - The delivery worker draining the outbound queue.
//! - The adapter health monitor.
//!
//! Both stop when the shutdown watch channel flips to `true` or its sender
//! is dropped.

use crate::service::BridgeService;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Handles of the running background tasks.
pub struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Starts the delivery worker and health monitor for `service`.
    pub fn spawn(service: &BridgeService) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let handles = vec![
            tokio::spawn(run_delivery_worker(service.clone(), rx.clone())),
            tokio::spawn(run_health_monitor(service.clone(), rx)),
        ];
        Self { shutdown, handles }
    }

    /// Signals shutdown and waits for every task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("background task join error: {}", e);
            }
        }
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Drains the queue whenever a message is enqueued, and on every tick of
/// `drain_interval_ms`.
pub async fn run_delivery_worker(service: BridgeService, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_millis(service.settings().drain_interval_ms.max(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        drain_interval_ms = period.as_millis() as u64,
        "starting delivery worker"
    );

    loop {
        tokio::select! {
            () = stopped(&mut shutdown) => break,
            () = service.notified() => {}
            _ = ticker.tick() => {}
        }
        let processed = service.drain_queue().await;
        if processed > 0 {
            tracing::debug!(envelopes = processed, "drained outbound queue");
        }
    }

    tracing::info!("delivery worker stopped");
}

/// Logs every unhealthy adapter once per `health_interval_secs`.
///
/// Observability only: unhealthy platforms stay registered and routable.
pub async fn run_health_monitor(service: BridgeService, mut shutdown: watch::Receiver<bool>) {
    let interval_secs = service.settings().health_interval_secs;
    if interval_secs == 0 {
        tracing::warn!("health monitor disabled (interval=0)");
        return;
    }
    let period = Duration::from_secs(interval_secs);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_secs, "starting health monitor");

    loop {
        tokio::select! {
            () = stopped(&mut shutdown) => break,
            _ = ticker.tick() => {}
        }

        let report = service.get_platform_health().await;
        let unhealthy = report.values().filter(|s| !s.is_healthy).count();
        for (platform, status) in &report {
            if !status.is_healthy {
                tracing::warn!(
                    platform = %platform,
                    latency_ms = status.latency_ms,
                    error_rate = status.error_rate,
                    last_error = status.last_error.as_deref().unwrap_or(""),
                    "platform unhealthy"
                );
            }
        }
        tracing::debug!(
            platforms = report.len(),
            unhealthy,
            "health check complete"
        );
    }

    tracing::info!("health monitor stopped");
}
