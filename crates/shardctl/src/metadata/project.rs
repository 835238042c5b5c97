//! Project definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project ID
pub type ProjectId = String;

/// Upper bound accepted for `ProjectSettings::replication_factor`
pub const MAX_REPLICATION_FACTOR: u32 = 5;

/// Project status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Inactive,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Active => write!(f, "active"),
            ProjectStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// How rows are meant to be spread across a project's shards
///
/// Recorded for the shard-assignment layer; the router itself never consults it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardingStrategy {
    /// Contiguous key ranges per shard
    #[default]
    Range,
    /// Hash of the shard key modulo shard count
    Hash,
    /// Consistent hashing ring
    Consistent,
    /// Lookup table from key to shard
    Directory,
}

impl std::fmt::Display for ShardingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShardingStrategy::Range => write!(f, "range"),
            ShardingStrategy::Hash => write!(f, "hash"),
            ShardingStrategy::Consistent => write!(f, "consistent"),
            ShardingStrategy::Directory => write!(f, "directory"),
        }
    }
}

/// Per-project sharding and durability settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub sharding_strategy: ShardingStrategy,
    /// Column used to place rows on shards
    pub shard_key: String,
    /// Copies kept of each shard (1 means no replication)
    pub replication_factor: u32,
    pub auto_failover: bool,
    pub read_replicas: bool,
    pub backup_enabled: bool,
    pub compression_enabled: bool,
    pub encryption_enabled: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            sharding_strategy: ShardingStrategy::Range,
            shard_key: "id".to_string(),
            replication_factor: 2,
            auto_failover: true,
            read_replicas: true,
            backup_enabled: true,
            compression_enabled: false,
            encryption_enabled: true,
        }
    }
}

impl ProjectSettings {
    /// Check the settings, returning a description of the first problem found
    pub fn validate(&self) -> Result<(), String> {
        if self.shard_key.trim().is_empty() {
            return Err("shard key must not be empty".to_string());
        }
        if self.replication_factor == 0 || self.replication_factor > MAX_REPLICATION_FACTOR {
            return Err(format!(
                "replication factor must be between 1 and {}, got {}",
                MAX_REPLICATION_FACTOR, self.replication_factor
            ));
        }
        Ok(())
    }
}

/// Project as stored by the registry
///
/// Has no shard count: that is derived from the shard list on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    /// Connection descriptor of the project's default database
    pub connection_string: String,
    pub created_at: DateTime<Utc>,
    pub status: ProjectStatus,
    #[serde(default)]
    pub settings: ProjectSettings,
}

impl ProjectRecord {
    /// Create a new active project with default settings
    pub fn new(id: ProjectId, name: String, connection_string: String) -> Self {
        Self {
            id,
            name,
            connection_string,
            created_at: Utc::now(),
            status: ProjectStatus::Active,
            settings: ProjectSettings::default(),
        }
    }

    /// Attach the derived shard count
    pub fn to_project(&self, shard_count: usize) -> Project {
        Project {
            id: self.id.clone(),
            name: self.name.clone(),
            connection_string: self.connection_string.clone(),
            created_at: self.created_at,
            status: self.status,
            shard_count,
            settings: self.settings.clone(),
        }
    }
}

/// Project as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub connection_string: String,
    pub created_at: DateTime<Utc>,
    pub status: ProjectStatus,
    /// Number of shards owned by this project at the time of the read
    pub shard_count: usize,
    pub settings: ProjectSettings,
}
