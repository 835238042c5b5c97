//! Registry metadata definitions
//!
//! Contains the core data structures: projects, shards, query results and the
//! registry state that owns them

mod project;
mod query;
mod shard;
mod state;

pub use project::{
    Project, ProjectId, ProjectSettings, ProjectStatus, ShardingStrategy, MAX_REPLICATION_FACTOR,
};
pub use query::{QueryResult, Row, Value};
pub use shard::{ProbeTelemetry, Shard, ShardId, ShardStatus};
pub use state::{RegistryState, RegistryStats};
