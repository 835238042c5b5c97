//! Query router
//!
//! Routes one SQL statement to a single shard or to every online shard of a
//! project, then folds the per-shard answers into one `QueryResult`.
//!
//! Statements are dispatched concurrently, one task per shard, with no
//! cross-shard atomicity: a statement that succeeded on one shard is not
//! undone when a sibling fails. Outcomes are always collected in full and the
//! error reported for a fan-out is the one of the earliest-created failing
//! shard, regardless of which finished first.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchConnector, DispatchError, ShardResult};
use crate::error::{ControlError, Result};
use crate::metadata::{QueryResult, Shard, ShardId};
use crate::registry::Registry;

/// Query router configuration
#[derive(Debug, Clone)]
pub struct QueryRouterConfig {
    /// Deadline for a whole query when the caller gives none
    pub default_timeout: Duration,
}

impl Default for QueryRouterConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// Shards a statement will be sent to
#[derive(Debug)]
struct DispatchPlan {
    /// Dispatch targets in shard creation order
    candidates: Vec<Shard>,
    /// Project shards left out because they were not online
    skipped: Vec<ShardId>,
    /// Caller picked one shard explicitly
    targeted: bool,
}

/// Query router
pub struct QueryRouter {
    config: QueryRouterConfig,
    registry: Arc<Registry>,
    connector: Arc<dyn DispatchConnector>,
}

impl QueryRouter {
    /// Create query router
    pub fn new(
        config: QueryRouterConfig,
        registry: Arc<Registry>,
        connector: Arc<dyn DispatchConnector>,
    ) -> Self {
        Self {
            config,
            registry,
            connector,
        }
    }

    /// Run a statement with the default deadline
    ///
    /// `target_shard_id` selects a single shard; `None` fans out to every
    /// online shard of the project.
    pub async fn run_query(
        &self,
        project_id: &str,
        sql: &str,
        target_shard_id: Option<&str>,
    ) -> Result<QueryResult> {
        self.run_query_with_timeout(project_id, sql, target_shard_id, self.config.default_timeout)
            .await
    }

    /// Run a statement, failing with `Timeout` if the shards do not all answer in time
    pub async fn run_query_with_timeout(
        &self,
        project_id: &str,
        sql: &str,
        target_shard_id: Option<&str>,
        timeout: Duration,
    ) -> Result<QueryResult> {
        if sql.trim().is_empty() {
            return Err(ControlError::Validation("SQL text must not be empty".to_string()));
        }

        let plan = self.plan(project_id, target_shard_id).await?;
        debug!(
            "Dispatching query on project {} to {} shard(s), {} skipped",
            project_id,
            plan.candidates.len(),
            plan.skipped.len()
        );

        let outcomes = self.dispatch(&plan.candidates, sql, timeout).await?;

        if plan.targeted {
            let shard = &plan.candidates[0];
            return match outcomes.into_iter().next() {
                Some(Ok(result)) => Ok(result.into()),
                Some(Err(source)) => Err(ControlError::Dispatch {
                    shard_id: shard.id.clone(),
                    source,
                }),
                None => Err(ControlError::shard_not_found(shard.id.clone())),
            };
        }

        let mut result = merge(&plan.candidates, outcomes)?;
        if !plan.skipped.is_empty() {
            info!(
                "Query on project {} skipped {} non-online shard(s): {:?}",
                project_id,
                plan.skipped.len(),
                plan.skipped
            );
        }
        result.skipped_shards = plan.skipped;
        Ok(result)
    }

    /// Resolve dispatch targets
    async fn plan(&self, project_id: &str, target_shard_id: Option<&str>) -> Result<DispatchPlan> {
        let (_, shards) = self.registry.project_with_shards(project_id).await?;

        if let Some(target) = target_shard_id {
            let shard = shards
                .into_iter()
                .find(|s| s.id == target)
                .ok_or_else(|| ControlError::shard_not_found(target))?;
            return Ok(DispatchPlan {
                candidates: vec![shard],
                skipped: Vec::new(),
                targeted: true,
            });
        }

        let (candidates, skipped): (Vec<_>, Vec<_>) =
            shards.into_iter().partition(|s| s.is_online());
        if candidates.is_empty() {
            return Err(ControlError::NoAvailableShard(project_id.to_string()));
        }

        Ok(DispatchPlan {
            candidates,
            skipped: skipped.into_iter().map(|s| s.id).collect(),
            targeted: false,
        })
    }

    /// Send the statement to every candidate concurrently
    ///
    /// Outcomes come back in candidate order. On timeout the outstanding
    /// tasks are aborted; shards that already ran the statement keep its effects.
    async fn dispatch(
        &self,
        candidates: &[Shard],
        sql: &str,
        timeout: Duration,
    ) -> Result<Vec<Result<ShardResult, DispatchError>>> {
        let sql: Arc<str> = Arc::from(sql);
        let handles: Vec<JoinHandle<Result<ShardResult, DispatchError>>> = candidates
            .iter()
            .map(|shard| {
                let client = self.connector.connect(shard);
                let sql = sql.clone();
                tokio::spawn(async move { client.execute(&sql).await })
            })
            .collect();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let collect = async move {
            let mut outcomes = Vec::with_capacity(handles.len());
            for handle in handles {
                outcomes.push(match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(DispatchError::Unreachable(format!("dispatch task failed: {}", e))),
                });
            }
            outcomes
        };

        match tokio::time::timeout(timeout, collect).await {
            Ok(outcomes) => Ok(outcomes),
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                warn!(
                    "Query timed out after {:?} across {} shard(s)",
                    timeout,
                    candidates.len()
                );
                Err(ControlError::Timeout(timeout))
            }
        }
    }
}

/// Fold fan-out outcomes into one result
///
/// Any error wins over every success. Rows are concatenated in candidate order
/// with no dedup or re-sorting; affected counts are summed; the reported time
/// is the slowest shard's.
fn merge(
    candidates: &[Shard],
    outcomes: Vec<Result<ShardResult, DispatchError>>,
) -> Result<QueryResult> {
    let mut results = Vec::with_capacity(outcomes.len());
    for (shard, outcome) in candidates.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(source) => {
                return Err(ControlError::Dispatch {
                    shard_id: shard.id.clone(),
                    source,
                })
            }
        }
    }

    let execution_time = results
        .iter()
        .map(|r| r.execution_time)
        .fold(0.0_f64, f64::max);

    let mut results = results.into_iter();
    let Some(first) = results.next() else {
        return Ok(QueryResult::rows(Vec::new(), Vec::new(), execution_time));
    };

    if first.affected_rows.is_some() {
        let affected = results.fold(first.affected_rows.unwrap_or(0), |sum, r| {
            sum.saturating_add(r.affected_rows.unwrap_or(0))
        });
        return Ok(QueryResult::affected(affected, execution_time));
    }

    let columns = first.columns;
    let mut rows = first.rows;
    for (shard, result) in candidates.iter().skip(1).zip(results) {
        if result.columns != columns {
            warn!(
                "Shard {} returned columns {:?}, expected {:?}",
                shard.id, result.columns, columns
            );
        }
        rows.extend(result.rows);
    }
    Ok(QueryResult::rows(columns, rows, execution_time))
}
