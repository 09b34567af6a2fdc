//! Background sync worker.
//!
//! Drives the [`SyncManager`] from two timers: a connectivity probe that
//! flips the manager online or offline, and a periodic drain that runs while
//! online. Reconnecting drains at once (the manager does that on the
//! offline-to-online transition), so the periodic drain only has to pick up
//! retries whose backoff has elapsed.
//!
//! The join handle is tracked, cancellation is explicit, and `stop` waits at
//! most [`WORKER_JOIN_TIMEOUT_SECS`] for the loop to finish.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use barsync_common::error::{ErrorClassification, ErrorSeverity};
use barsync_core::{SyncError, SyncManager};
use barsync_domain::constants::WORKER_JOIN_TIMEOUT_SECS;
use barsync_domain::SyncConfig;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::errors::WorkerError;

/// Cheap check of whether the backend can currently be reached.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct SyncWorkerConfig {
    /// Interval between periodic drains while online
    pub drain_interval: Duration,
    /// Interval between connectivity probes
    pub probe_interval: Duration,
    /// How long `stop` waits for the loop to exit
    pub join_timeout: Duration,
}

impl Default for SyncWorkerConfig {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl SyncWorkerConfig {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            drain_interval: Duration::from_secs(config.interval_seconds.max(1)),
            probe_interval: Duration::from_secs(config.connectivity_probe_seconds.max(1)),
            join_timeout: Duration::from_secs(WORKER_JOIN_TIMEOUT_SECS),
        }
    }
}

/// Sync worker with explicit lifecycle management.
pub struct SyncWorker {
    sync: Arc<SyncManager>,
    probe: Arc<dyn ConnectivityProbe>,
    config: SyncWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl SyncWorker {
    pub fn new(
        sync: Arc<SyncManager>,
        probe: Arc<dyn ConnectivityProbe>,
        config: SyncWorkerConfig,
    ) -> Self {
        Self {
            sync,
            probe,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Spawn the background loop.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.is_running() {
            return Err(WorkerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let sync = Arc::clone(&self.sync);
        let probe = Arc::clone(&self.probe);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::run_loop(sync, probe, config, cancel).await;
        }));

        info!(
            drain_interval_secs = self.config.drain_interval.as_secs(),
            probe_interval_secs = self.config.probe_interval.as_secs(),
            "sync worker started"
        );
        Ok(())
    }

    /// Cancel the loop and wait for it to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), WorkerError> {
        let Some(handle) = self.task_handle.take() else {
            return Err(WorkerError::NotRunning);
        };

        self.cancellation.cancel();

        let join_timeout = self.config.join_timeout;
        match tokio::time::timeout(join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "sync worker task panicked");
                return Err(WorkerError::Panicked(e.to_string()));
            }
            Err(_) => {
                warn!("sync worker task did not complete within timeout");
                return Err(WorkerError::JoinTimeout(join_timeout));
            }
        }

        info!("sync worker stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn run_loop(
        sync: Arc<SyncManager>,
        probe: Arc<dyn ConnectivityProbe>,
        config: SyncWorkerConfig,
        cancel: CancellationToken,
    ) {
        let mut probe_tick = interval(config.probe_interval);
        probe_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut drain_tick = interval(config.drain_interval);
        drain_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("sync worker loop cancelled");
                    break;
                }
                _ = probe_tick.tick() => {
                    let reachable = probe.is_reachable().await;
                    if reachable == sync.is_online() {
                        continue;
                    }
                    match sync.set_online(reachable).await {
                        Ok(Some(report)) => info!(
                            synced = report.synced,
                            failed = report.failed,
                            deferred = report.deferred,
                            "reconnected and drained"
                        ),
                        Ok(None) => debug!(online = reachable, "connectivity updated"),
                        Err(SyncError::ShutDown) => break,
                        Err(e) => log_drain_error(&e, "drain after reconnect failed"),
                    }
                }
                _ = drain_tick.tick() => {
                    if !sync.is_online() {
                        debug!("offline, skipping periodic drain");
                        continue;
                    }
                    match sync.drain().await {
                        Ok(report) if report.is_empty() => {}
                        Ok(report) => debug!(
                            attempted = report.attempted,
                            synced = report.synced,
                            retry_scheduled = report.retry_scheduled,
                            "periodic drain finished"
                        ),
                        Err(SyncError::ShutDown) => break,
                        Err(e) => log_drain_error(&e, "periodic drain failed"),
                    }
                }
            }
        }
    }
}

/// Transient drain failures are logged as warnings; the next tick retries.
fn log_drain_error(err: &SyncError, message: &str) {
    match err.severity() {
        ErrorSeverity::Error | ErrorSeverity::Critical => {
            error!(error = %err, critical = err.is_critical(), "{message}");
        }
        ErrorSeverity::Info | ErrorSeverity::Warning => {
            warn!(error = %err, retryable = err.is_retryable(), "{message}");
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncWorker dropped while running; cancelling loop");
            self.cancellation.cancel();
        }
    }
}
