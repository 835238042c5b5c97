//! shardctl - Control plane for sharded SQL deployments
//!
//! Keeps the registry of projects and their shards, tracks shard health, and
//! routes SQL statements to one shard or to every online shard of a project.
//!
//! # Features
//! - Project and shard registry with derived shard counts
//! - Periodic health probing with operator-owned maintenance mode
//! - Concurrent query fan-out with all-or-nothing error reporting
//! - HTTP management API, with an optional JSON snapshot file
//!
//! # Usage Example
//! ```ignore
//! use shardctl::{ShardCtl, config::Config};
//!
//! let ctl = ShardCtl::new(Config::default()).await?;
//! let project = ctl.registry().create_project("orders", "postgres://db/orders").await?;
//! ctl.registry().create_shard(&project.id, "db1.internal", 5432, "orders_1").await?;
//! let result = ctl.router().run_query(&project.id, "SELECT * FROM orders", None).await?;
//! ```

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod metadata;
pub mod registry;
pub mod router;
pub mod storage;
pub mod watch;

// Re-export commonly used types
pub use error::{ControlError, Result};
pub use metadata::{Project, QueryResult, Shard, ShardStatus};

use std::sync::Arc;
use tracing::info;

use config::Config;
use dispatch::{DispatchConnector, MemoryConnector};
use health::HealthMonitor;
use registry::Registry;
use router::QueryRouter;
use storage::{FileStorage, StorageError};

/// shardctl control plane
pub struct ShardCtl {
    config: Config,
    storage: Option<FileStorage>,
    registry: Arc<Registry>,
    router: QueryRouter,
    health_monitor: Arc<HealthMonitor>,
}

impl ShardCtl {
    /// Create instance backed by in-memory executors
    pub async fn new(config: Config) -> std::result::Result<Self, StorageError> {
        let connector = Arc::new(MemoryConnector::new(config.executor.memory_config()));
        Self::with_connector(config, connector).await
    }

    /// Create instance with the given dispatch connector
    pub async fn with_connector(
        config: Config,
        connector: Arc<dyn DispatchConnector>,
    ) -> std::result::Result<Self, StorageError> {
        let storage = config.server.data_dir.as_ref().map(FileStorage::new);
        let state = match &storage {
            Some(storage) => storage.load_or_default().await?,
            None => Default::default(),
        };
        let registry = Arc::new(Registry::from_state(state));

        let router = QueryRouter::new(
            config.query.router_config(),
            registry.clone(),
            connector.clone(),
        );
        let health_monitor = Arc::new(HealthMonitor::new(
            config.health.monitor_config(),
            registry.clone(),
            connector,
        ));

        info!(
            "shardctl initialized: data_dir={:?}, query timeout={}ms",
            config.server.data_dir, config.query.timeout_ms
        );

        Ok(Self {
            config,
            storage,
            registry,
            router,
            health_monitor,
        })
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get query router
    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    /// Get health monitor
    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.health_monitor
    }

    /// Save registry (no-op without a data directory)
    pub async fn save(&self) -> std::result::Result<(), StorageError> {
        match &self.storage {
            Some(storage) => storage.save(&self.registry.snapshot().await).await,
            None => Ok(()),
        }
    }

    /// Start health monitor
    pub fn start_health_monitor(&self) -> tokio::task::JoinHandle<()> {
        self.health_monitor.clone().start()
    }

    /// Save if the registry changed since `saved`, updating it on success
    ///
    /// Probe telemetry does not bump the registry version, so the count of
    /// applied probes is tracked alongside it.
    pub async fn save_if_changed(
        &self,
        saved: &mut Option<(u64, u64)>,
    ) -> std::result::Result<bool, StorageError> {
        let mark = (self.registry.version().await, self.registry.probes_applied());
        if *saved == Some(mark) {
            return Ok(false);
        }
        self.save().await?;
        *saved = Some(mark);
        Ok(true)
    }

    /// Start periodic save task
    pub fn start_periodic_save(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        use tokio::time::interval;

        let period = self.config.server.save_interval();
        tokio::spawn(async move {
            let mut interval = interval(period);
            let mut saved = None;
            loop {
                interval.tick().await;
                if let Err(e) = self.save_if_changed(&mut saved).await {
                    tracing::error!("Failed to save registry: {}", e);
                }
            }
        })
    }
}
