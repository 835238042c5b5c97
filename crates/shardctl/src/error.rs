//! Control plane errors

use std::time::Duration;

use crate::dispatch::DispatchError;
use crate::metadata::{ProjectId, ShardId};

/// Errors surfaced by the registry and the query router
///
/// None of them is retried inside the crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    /// Malformed input; retrying the same call cannot succeed
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    /// All-shards query on a project with no online shard
    #[error("No available shard for project {0}")]
    NoAvailableShard(ProjectId),
    #[error("Shard {shard_id} failed: {source}")]
    Dispatch {
        shard_id: ShardId,
        #[source]
        source: DispatchError,
    },
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),
}

impl ControlError {
    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { kind: "Project", id: id.into() }
    }

    pub fn shard_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { kind: "Shard", id: id.into() }
    }
}

pub type Result<T, E = ControlError> = std::result::Result<T, E>;
