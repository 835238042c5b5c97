//! Dispatch client capability
//!
//! The seam between the control plane and whatever actually talks to a shard's
//! SQL executor. The router sends statements through it and the health monitor
//! probes through it; neither knows what sits behind.

mod memory;

pub use memory::{MemoryConnector, MemoryExecutor, MemoryExecutorConfig};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::metadata::{ProbeTelemetry, QueryResult, Row, Shard};

/// Dispatch client error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The executor rejected the statement (syntax error, constraint violation...)
    #[error("Execution error: {0}")]
    Execution(String),
    /// The executor could not be reached
    #[error("Shard unreachable: {0}")]
    Unreachable(String),
}

/// Liveness probe answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub alive: bool,
    pub load: u8,
    pub connections: u32,
}

impl ProbeReport {
    /// Telemetry to record, or None when the executor reports itself dead
    pub fn telemetry(&self) -> Option<ProbeTelemetry> {
        self.alive.then_some(ProbeTelemetry {
            load: self.load,
            connections: self.connections,
        })
    }
}

/// Successful response of one shard
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShardResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Set for statements that do not return rows
    pub affected_rows: Option<u64>,
    /// Seconds
    pub execution_time: f64,
}

impl ShardResult {
    pub fn rows(columns: Vec<String>, rows: Vec<Row>, execution_time: f64) -> Self {
        Self {
            columns,
            rows,
            affected_rows: None,
            execution_time,
        }
    }

    pub fn affected(affected_rows: u64, execution_time: f64) -> Self {
        Self {
            affected_rows: Some(affected_rows),
            execution_time,
            ..Default::default()
        }
    }
}

impl From<ShardResult> for QueryResult {
    fn from(result: ShardResult) -> Self {
        match result.affected_rows {
            Some(affected) => QueryResult::affected(affected, result.execution_time),
            None => QueryResult::rows(result.columns, result.rows, result.execution_time),
        }
    }
}

/// Connection to one shard's executor
///
/// Retry policy, pooling and connection timeouts belong to implementations.
#[async_trait]
pub trait DispatchClient: Send + Sync {
    /// Lightweight liveness check
    async fn probe(&self) -> Result<ProbeReport, DispatchError>;

    /// Run one SQL statement
    async fn execute(&self, sql: &str) -> Result<ShardResult, DispatchError>;
}

/// Hands out the client for a shard
pub trait DispatchConnector: Send + Sync {
    fn connect(&self, shard: &Shard) -> Arc<dyn DispatchClient>;
}
