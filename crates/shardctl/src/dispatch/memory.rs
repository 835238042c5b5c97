//! In-memory executor
//!
//! Stands in for a real SQL driver. Each shard gets its own executor whose
//! behaviour can be scripted (response, reachability, telemetry, latency);
//! unscripted executors answer with canned data shaped like a small users table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use tracing::debug;

use super::{DispatchClient, DispatchConnector, DispatchError, ProbeReport, ShardResult};
use crate::metadata::{ProbeTelemetry, Shard, ShardId, Value};

/// In-memory executor configuration
#[derive(Debug, Clone)]
pub struct MemoryExecutorConfig {
    /// Simulated statement latency
    pub execute_latency: Duration,
    /// Simulated probe latency
    pub probe_latency: Duration,
}

impl Default for MemoryExecutorConfig {
    fn default() -> Self {
        Self {
            execute_latency: Duration::from_millis(50),
            probe_latency: Duration::from_millis(5),
        }
    }
}

#[derive(Debug, Clone)]
struct Script {
    reachable: bool,
    latency: Option<Duration>,
    telemetry: Option<ProbeTelemetry>,
    response: Option<Result<ShardResult, DispatchError>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            reachable: true,
            latency: None,
            telemetry: None,
            response: None,
        }
    }
}

/// Executor of a single shard
pub struct MemoryExecutor {
    shard_id: ShardId,
    config: MemoryExecutorConfig,
    script: Mutex<Script>,
    execute_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl MemoryExecutor {
    pub fn new(shard_id: ShardId, config: MemoryExecutorConfig) -> Self {
        Self {
            shard_id,
            config,
            script: Mutex::new(Script::default()),
            execute_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
        }
    }

    /// Make probes and statements fail as if the host were down
    pub fn set_reachable(&self, reachable: bool) {
        self.script.lock().reachable = reachable;
    }

    /// Fixed telemetry for probes (random otherwise)
    pub fn set_telemetry(&self, load: u8, connections: u32) {
        self.script.lock().telemetry = Some(ProbeTelemetry { load, connections });
    }

    /// Answer every statement with this response
    pub fn set_response(&self, response: Result<ShardResult, DispatchError>) {
        self.script.lock().response = Some(response);
    }

    /// Override the configured latency for both probes and statements
    pub fn set_latency(&self, latency: Duration) {
        self.script.lock().latency = Some(latency);
    }

    /// Number of statements received
    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    /// Number of probes received
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    fn script(&self) -> Script {
        self.script.lock().clone()
    }
}

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[async_trait]
impl DispatchClient for MemoryExecutor {
    async fn probe(&self) -> Result<ProbeReport, DispatchError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script();
        simulate_latency(script.latency.unwrap_or(self.config.probe_latency)).await;

        if !script.reachable {
            return Err(DispatchError::Unreachable(self.shard_id.clone()));
        }
        let telemetry = script.telemetry.unwrap_or_else(|| ProbeTelemetry {
            load: rand::thread_rng().gen_range(0..=100),
            connections: rand::thread_rng().gen_range(0..50),
        });
        Ok(ProbeReport {
            alive: true,
            load: telemetry.load,
            connections: telemetry.connections,
        })
    }

    async fn execute(&self, sql: &str) -> Result<ShardResult, DispatchError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let script = self.script();
        simulate_latency(script.latency.unwrap_or(self.config.execute_latency)).await;

        if !script.reachable {
            return Err(DispatchError::Unreachable(self.shard_id.clone()));
        }
        if let Some(response) = script.response {
            return response;
        }

        debug!("Shard {} executing canned statement", self.shard_id);
        canned_response(sql, started.elapsed().as_secs_f64())
    }
}

/// Canned answer keyed on statement keywords
fn canned_response(sql: &str, execution_time: f64) -> Result<ShardResult, DispatchError> {
    let sql = sql.to_lowercase();

    if sql.contains("error") {
        return Err(DispatchError::Execution("Syntax error in SQL query".to_string()));
    }

    if sql.contains("select") {
        let columns = ["id", "name", "email", "created_at"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let users = [
            (1, "John Doe", "john@example.com", "2024-01-15T10:00:00Z"),
            (2, "Jane Smith", "jane@example.com", "2024-01-16T11:30:00Z"),
            (3, "Bob Johnson", "bob@example.com", "2024-01-17T09:15:00Z"),
        ];
        let rows = users
            .iter()
            .map(|(id, name, email, created_at)| {
                vec![
                    Value::Int(*id),
                    Value::from(*name),
                    Value::from(*email),
                    Value::from(*created_at),
                ]
            })
            .collect();
        return Ok(ShardResult::rows(columns, rows, execution_time));
    }

    if ["insert", "update", "delete"].iter().any(|kw| sql.contains(kw)) {
        let affected = rand::thread_rng().gen_range(1..=10);
        return Ok(ShardResult::affected(affected, execution_time));
    }

    Ok(ShardResult::rows(
        vec!["result".to_string()],
        vec![vec![Value::from("Query executed successfully")]],
        execution_time,
    ))
}

/// Connector owning one in-memory executor per shard
pub struct MemoryConnector {
    config: MemoryExecutorConfig,
    executors: Mutex<HashMap<ShardId, Arc<MemoryExecutor>>>,
}

impl MemoryConnector {
    pub fn new(config: MemoryExecutorConfig) -> Self {
        Self {
            config,
            executors: Mutex::new(HashMap::new()),
        }
    }

    /// Executor for a shard, created on first use
    pub fn executor(&self, shard_id: &str) -> Arc<MemoryExecutor> {
        self.executors
            .lock()
            .entry(shard_id.to_string())
            .or_insert_with(|| {
                Arc::new(MemoryExecutor::new(shard_id.to_string(), self.config.clone()))
            })
            .clone()
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new(MemoryExecutorConfig::default())
    }
}

impl DispatchConnector for MemoryConnector {
    fn connect(&self, shard: &Shard) -> Arc<dyn DispatchClient> {
        self.executor(&shard.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> MemoryExecutor {
        MemoryExecutor::new(
            "shard-1".to_string(),
            MemoryExecutorConfig {
                execute_latency: Duration::ZERO,
                probe_latency: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_canned_responses() {
        let exec = executor();

        let result = exec.execute("SELECT * FROM users").await.unwrap();
        assert_eq!(result.columns, vec!["id", "name", "email", "created_at"]);
        assert_eq!(result.rows.len(), 3);
        assert!(result.affected_rows.is_none());

        let result = exec.execute("UPDATE users SET name = 'x'").await.unwrap();
        let affected = result.affected_rows.unwrap();
        assert!((1..=10).contains(&affected));
        assert!(result.columns.is_empty());

        let err = exec.execute("SELECT error FROM t").await.unwrap_err();
        assert!(matches!(err, DispatchError::Execution(_)));

        let result = exec.execute("VACUUM").await.unwrap();
        assert_eq!(result.columns, vec!["result"]);
        assert_eq!(exec.execute_calls(), 4);
    }

    #[tokio::test]
    async fn test_scripted_executor() {
        let exec = executor();
        exec.set_telemetry(42, 9);
        let report = exec.probe().await.unwrap();
        assert_eq!(report, ProbeReport { alive: true, load: 42, connections: 9 });

        exec.set_response(Ok(ShardResult::affected(7, 0.5)));
        assert_eq!(exec.execute("anything").await.unwrap(), ShardResult::affected(7, 0.5));

        exec.set_reachable(false);
        assert!(matches!(exec.probe().await, Err(DispatchError::Unreachable(_))));
        assert!(matches!(exec.execute("SELECT 1").await, Err(DispatchError::Unreachable(_))));
        assert_eq!(exec.probe_calls(), 2);
    }

    #[test]
    fn test_connector_reuses_executor() {
        let connector = MemoryConnector::default();
        let a = connector.executor("shard-a");
        let b = connector.executor("shard-a");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &connector.executor("shard-b")));
    }
}
