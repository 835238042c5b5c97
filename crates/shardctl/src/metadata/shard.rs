//! Shard information definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProjectId;

/// Shard ID
///
/// Unique across all projects, not just within the owning one.
pub type ShardId = String;

/// Shard status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardStatus {
    /// Reachable, takes part in all-shards queries
    #[default]
    Online,
    /// Last probe failed or timed out
    Offline,
    /// Pinned by an operator; the health monitor leaves it alone
    Maintenance,
}

impl std::fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShardStatus::Online => write!(f, "online"),
            ShardStatus::Offline => write!(f, "offline"),
            ShardStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Telemetry carried by a successful probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTelemetry {
    /// Utilization percentage
    pub load: u8,
    /// Active connection count
    pub connections: u32,
}

/// Shard information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    pub id: ShardId,
    /// Owning project
    pub project_id: ProjectId,
    pub hostname: String,
    pub port: u16,
    pub database: String,
    pub status: ShardStatus,
    /// Utilization percentage, 0-100
    pub load: u8,
    pub connections: u32,
    /// Time of the most recent successful probe
    pub last_ping: DateTime<Utc>,
}

impl Shard {
    /// Create new shard, online with zeroed telemetry
    pub fn new(
        id: ShardId,
        project_id: ProjectId,
        hostname: String,
        port: u16,
        database: String,
    ) -> Self {
        Self {
            id,
            project_id,
            hostname,
            port,
            database,
            status: ShardStatus::Online,
            load: 0,
            connections: 0,
            last_ping: Utc::now(),
        }
    }

    /// `host:port/database`
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.hostname, self.port, self.database)
    }

    pub fn is_online(&self) -> bool {
        self.status == ShardStatus::Online
    }

    /// Record a successful probe
    ///
    /// Maintenance is operator-owned and survives a successful probe.
    pub fn record_probe_success(&mut self, telemetry: ProbeTelemetry) {
        if self.status != ShardStatus::Maintenance {
            self.status = ShardStatus::Online;
        }
        self.load = telemetry.load.min(100);
        self.connections = telemetry.connections;
        self.last_ping = Utc::now();
    }

    /// Record a failed or timed out probe
    ///
    /// Telemetry keeps its last known values.
    pub fn record_probe_failure(&mut self) {
        if self.status != ShardStatus::Maintenance {
            self.status = ShardStatus::Offline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard() -> Shard {
        Shard::new(
            "shard-1".to_string(),
            "p1".to_string(),
            "db1.internal".to_string(),
            5432,
            "orders_1".to_string(),
        )
    }

    #[test]
    fn test_new_shard_is_online() {
        let s = shard();
        assert_eq!(s.status, ShardStatus::Online);
        assert_eq!(s.load, 0);
        assert_eq!(s.connections, 0);
        assert_eq!(s.address(), "db1.internal:5432/orders_1");
    }

    #[test]
    fn test_failure_keeps_stale_telemetry() {
        let mut s = shard();
        s.record_probe_success(ProbeTelemetry { load: 40, connections: 7 });
        let pinged = s.last_ping;

        s.record_probe_failure();
        assert_eq!(s.status, ShardStatus::Offline);
        assert_eq!(s.load, 40);
        assert_eq!(s.connections, 7);
        assert_eq!(s.last_ping, pinged);

        s.record_probe_success(ProbeTelemetry { load: 250, connections: 1 });
        assert_eq!(s.status, ShardStatus::Online);
        assert_eq!(s.load, 100);
    }

    #[test]
    fn test_probe_never_touches_maintenance() {
        let mut s = shard();
        s.status = ShardStatus::Maintenance;
        s.record_probe_success(ProbeTelemetry { load: 10, connections: 2 });
        assert_eq!(s.status, ShardStatus::Maintenance);
        assert_eq!(s.load, 10);
        s.record_probe_failure();
        assert_eq!(s.status, ShardStatus::Maintenance);
    }
}
