//! Shard health monitoring
//!
//! Periodically probes every shard's executor and records status and telemetry
//! in the registry. Each probe runs in its own task under its own timeout, so
//! a hung shard only delays its own update.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::dispatch::DispatchConnector;
use crate::registry::Registry;

/// Health monitor configuration
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Time between two probe rounds
    pub probe_interval: Duration,
    /// Deadline for a single probe
    pub probe_timeout: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(1),
        }
    }
}

/// Outcome counts of one probe round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub probed: usize,
    pub alive: usize,
    pub failed: usize,
}

/// Health monitor
pub struct HealthMonitor {
    config: HealthMonitorConfig,
    registry: Arc<Registry>,
    connector: Arc<dyn DispatchConnector>,
}

impl HealthMonitor {
    /// Create health monitor
    pub fn new(
        config: HealthMonitorConfig,
        registry: Arc<Registry>,
        connector: Arc<dyn DispatchConnector>,
    ) -> Self {
        Self {
            config,
            registry,
            connector,
        }
    }

    /// Start probe loop task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let probe_interval = self.config.probe_interval;
        info!(
            "Health monitor started: interval={:?}, timeout={:?}",
            probe_interval, self.config.probe_timeout
        );

        tokio::spawn(async move {
            let mut interval = interval(probe_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }

    /// Probe every shard once
    ///
    /// Returns after every probe has finished or hit its timeout.
    pub async fn tick(&self) -> ProbeSummary {
        let shards = self.registry.all_shards().await;
        let mut summary = ProbeSummary {
            probed: shards.len(),
            ..Default::default()
        };

        let mut probes = JoinSet::new();
        for shard in shards {
            let client = self.connector.connect(&shard);
            let registry = self.registry.clone();
            let timeout = self.config.probe_timeout;

            probes.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, client.probe()).await {
                    Ok(Ok(report)) => {
                        if report.alive {
                            debug!(
                                "Shard {} alive: load={}%, connections={}",
                                shard.id, report.load, report.connections
                            );
                        } else {
                            warn!("Shard {} reported itself not alive", shard.id);
                        }
                        report.telemetry()
                    }
                    Ok(Err(e)) => {
                        warn!("Probe of shard {} failed: {}", shard.id, e);
                        None
                    }
                    Err(_) => {
                        warn!("Probe of shard {} timed out after {:?}", shard.id, timeout);
                        None
                    }
                };
                let alive = outcome.is_some();
                registry.record_probe(&shard.id, outcome).await;
                alive
            });
        }

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(true) => summary.alive += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    error!("Probe task failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        if summary.failed > 0 {
            info!(
                "Probe round: {} shards, {} alive, {} failed",
                summary.probed, summary.alive, summary.failed
            );
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{MemoryConnector, MemoryExecutorConfig};
    use crate::metadata::ShardStatus;

    async fn setup(
        shards: usize,
    ) -> (Arc<Registry>, Arc<MemoryConnector>, HealthMonitor, Vec<String>) {
        let registry = Arc::new(Registry::new());
        let connector = Arc::new(MemoryConnector::new(MemoryExecutorConfig {
            execute_latency: Duration::ZERO,
            probe_latency: Duration::ZERO,
        }));
        let project = registry.create_project("p", "dsn").await.unwrap();
        let mut ids = Vec::new();
        for i in 0..shards {
            let shard = registry
                .create_shard(&project.id, &format!("host{}", i), 5432, "db")
                .await
                .unwrap();
            ids.push(shard.id);
        }
        let monitor = HealthMonitor::new(
            HealthMonitorConfig {
                probe_interval: Duration::from_millis(20),
                probe_timeout: Duration::from_millis(100),
            },
            registry.clone(),
            connector.clone(),
        );
        (registry, connector, monitor, ids)
    }

    #[tokio::test]
    async fn test_probe_updates_telemetry() {
        let (registry, connector, monitor, ids) = setup(1).await;
        connector.executor(&ids[0]).set_telemetry(55, 21);
        let before = registry.get_shard(&ids[0]).await.unwrap().last_ping;

        let summary = monitor.tick().await;
        assert_eq!(summary, ProbeSummary { probed: 1, alive: 1, failed: 0 });

        let shard = registry.get_shard(&ids[0]).await.unwrap();
        assert_eq!(shard.status, ShardStatus::Online);
        assert_eq!((shard.load, shard.connections), (55, 21));
        assert!(shard.last_ping >= before);
    }

    #[tokio::test]
    async fn test_unreachable_goes_offline_and_back() {
        let (registry, connector, monitor, ids) = setup(1).await;
        let exec = connector.executor(&ids[0]);
        exec.set_telemetry(30, 4);
        monitor.tick().await;

        exec.set_reachable(false);
        let summary = monitor.tick().await;
        assert_eq!(summary.failed, 1);
        let shard = registry.get_shard(&ids[0]).await.unwrap();
        assert_eq!(shard.status, ShardStatus::Offline);
        assert_eq!((shard.load, shard.connections), (30, 4));

        exec.set_reachable(true);
        monitor.tick().await;
        assert_eq!(registry.get_shard(&ids[0]).await.unwrap().status, ShardStatus::Online);
    }

    #[tokio::test]
    async fn test_maintenance_is_never_cleared() {
        let (registry, connector, monitor, ids) = setup(1).await;
        registry
            .set_shard_status(&ids[0], ShardStatus::Maintenance)
            .await
            .unwrap();

        monitor.tick().await;
        assert_eq!(
            registry.get_shard(&ids[0]).await.unwrap().status,
            ShardStatus::Maintenance
        );

        connector.executor(&ids[0]).set_reachable(false);
        monitor.tick().await;
        assert_eq!(
            registry.get_shard(&ids[0]).await.unwrap().status,
            ShardStatus::Maintenance
        );
    }

    #[tokio::test]
    async fn test_slow_shard_does_not_block_siblings() {
        let (registry, connector, monitor, ids) = setup(3).await;
        connector.executor(&ids[1]).set_latency(Duration::from_secs(5));

        let started = std::time::Instant::now();
        let summary = monitor.tick().await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(summary, ProbeSummary { probed: 3, alive: 2, failed: 1 });

        let statuses: Vec<_> = registry
            .list_shards(&registry.get_shard(&ids[0]).await.unwrap().project_id)
            .await
            .into_iter()
            .map(|s| s.status)
            .collect();
        assert_eq!(
            statuses,
            vec![ShardStatus::Online, ShardStatus::Offline, ShardStatus::Online]
        );
    }

    #[tokio::test]
    async fn test_background_loop_probes() {
        let (registry, connector, monitor, ids) = setup(1).await;
        connector.executor(&ids[0]).set_reachable(false);

        let handle = Arc::new(monitor).start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(connector.executor(&ids[0]).probe_calls() >= 2);
        assert_eq!(registry.get_shard(&ids[0]).await.unwrap().status, ShardStatus::Offline);
    }
}
