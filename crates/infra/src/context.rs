//! Sync context - dependency container for one barsync client
//!
//! Builds every service from a [`BarSyncConfig`]: the SQLite operation store,
//! the offline queue, the API client (live or mock), the sync manager and its
//! background worker. Entity views are created on demand per bar.

use std::sync::Arc;

use barsync_common::error::CommonError;
use barsync_core::views::{ConsignmentsFamily, ReturnsFamily, SalesFamily, StockFamily};
use barsync_core::{
    AuthoritativeSource, BusinessDayCalendar, ConsignmentsView, OfflineQueue,
    OperationDispatcher, ReturnsView, RevenueCalculator, SalesView, StockView, SyncManager,
    SyncManagerConfig,
};
use barsync_domain::{ApiMode, BarSyncConfig, BarSyncError, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::api::{LiveApiClient, MockApiClient};
use crate::config;
use crate::database::{DbManager, SqliteOperationStore};
use crate::sync::{ConnectivityProbe, SyncWorker, SyncWorkerConfig, WorkerError};

/// Holds all services and their lifecycle.
pub struct SyncContext {
    config: BarSyncConfig,
    db: Arc<DbManager>,
    queue: Arc<OfflineQueue>,
    sync: Arc<SyncManager>,
    source: Arc<dyn AuthoritativeSource>,
    mock: Option<Arc<MockApiClient>>,
    calendar: BusinessDayCalendar,
    worker: Mutex<SyncWorker>,
}

impl SyncContext {
    /// Validate `config` and wire every service. Nothing runs in the
    /// background until [`Self::start`].
    pub fn new(config: BarSyncConfig) -> Result<Self> {
        config::validate(&config).map_err(|e| BarSyncError::Config(e.to_string()))?;

        let calendar =
            BusinessDayCalendar::from_config(&config.business_day).map_err(config_error)?;

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;
        let store = Arc::new(SqliteOperationStore::new(Arc::clone(&db)));
        let queue = Arc::new(OfflineQueue::new(store));

        let (dispatcher, source, probe, mock): (
            Arc<dyn OperationDispatcher>,
            Arc<dyn AuthoritativeSource>,
            Arc<dyn ConnectivityProbe>,
            Option<Arc<MockApiClient>>,
        ) = match config.api.mode {
            ApiMode::Live => {
                let client = Arc::new(LiveApiClient::new(&config.api)?);
                (client.clone(), client.clone(), client, None)
            }
            ApiMode::Mock => {
                let client = Arc::new(MockApiClient::new(&config.api));
                (client.clone(), client.clone(), client.clone(), Some(client))
            }
        };

        let manager_config = SyncManagerConfig::from_config(&config.sync).map_err(config_error)?;
        let sync = Arc::new(SyncManager::new(Arc::clone(&queue), dispatcher, manager_config));
        let worker = SyncWorker::new(
            Arc::clone(&sync),
            probe,
            SyncWorkerConfig::from_config(&config.sync),
        );

        info!(
            api_mode = %config.api.mode,
            db_path = %config.database.path,
            "sync context ready"
        );

        Ok(Self {
            config,
            db,
            queue,
            sync,
            source,
            mock,
            calendar,
            worker: Mutex::new(worker),
        })
    }

    /// Start the background sync worker (no-op when sync is disabled).
    pub async fn start(&self) -> Result<()> {
        if !self.config.sync.enabled {
            info!("background sync disabled; drains must be triggered manually");
            return Ok(());
        }
        match self.worker.lock().await.start() {
            Ok(()) | Err(WorkerError::AlreadyRunning) => Ok(()),
            Err(e) => Err(BarSyncError::Internal(e.to_string())),
        }
    }

    /// Stop the worker, then refuse further drains and queue writes.
    pub async fn shutdown(&self) -> Result<()> {
        let stopped = match self.worker.lock().await.stop().await {
            Ok(()) | Err(WorkerError::NotRunning) => Ok(()),
            Err(e) => {
                warn!(error = %e, "sync worker did not stop cleanly");
                Err(BarSyncError::Internal(e.to_string()))
            }
        };
        self.sync.shutdown();
        self.queue.shutdown();
        info!("sync context shut down");
        stopped
    }

    pub fn config(&self) -> &BarSyncConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    pub fn source(&self) -> &Arc<dyn AuthoritativeSource> {
        &self.source
    }

    /// The in-process backend when running in mock mode.
    pub fn mock(&self) -> Option<&Arc<MockApiClient>> {
        self.mock.as_ref()
    }

    pub fn health_check(&self) -> Result<()> {
        self.db.health_check()
    }

    pub fn sales_view(&self, bar_id: &str) -> SalesView {
        let family = SalesFamily::new(RevenueCalculator::new(self.calendar));
        SalesView::new(family, bar_id, Arc::clone(&self.sync), Arc::clone(&self.source))
    }

    pub fn returns_view(&self, bar_id: &str) -> ReturnsView {
        ReturnsView::new(ReturnsFamily, bar_id, Arc::clone(&self.sync), Arc::clone(&self.source))
    }

    pub fn consignments_view(&self, bar_id: &str) -> ConsignmentsView {
        ConsignmentsView::new(
            ConsignmentsFamily,
            bar_id,
            Arc::clone(&self.sync),
            Arc::clone(&self.source),
        )
    }

    pub fn stock_view(&self, bar_id: &str) -> StockView {
        StockView::new(StockFamily, bar_id, Arc::clone(&self.sync), Arc::clone(&self.source))
    }
}

fn config_error(err: CommonError) -> BarSyncError {
    BarSyncError::Config(err.to_string())
}
