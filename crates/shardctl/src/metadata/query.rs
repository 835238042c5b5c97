//! Query result definitions

use serde::{Deserialize, Serialize};

use super::ShardId;

/// Nullable scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One result row, ordered like `QueryResult::columns`
pub type Row = Vec<Value>;

/// Result of one `run_query` call
///
/// Built fresh per call and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Seconds spent by the slowest contributing shard
    pub execution_time: f64,
    /// Only set for statements that do not return rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Shards of the project left out of an all-shards query because they were not online
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_shards: Vec<ShardId>,
}

impl QueryResult {
    /// Result of a row-returning statement
    pub fn rows(columns: Vec<String>, rows: Vec<Row>, execution_time: f64) -> Self {
        Self {
            columns,
            rows,
            execution_time,
            ..Default::default()
        }
    }

    /// Result of a statement that only reports affected rows
    pub fn affected(affected_rows: u64, execution_time: f64) -> Self {
        Self {
            execution_time,
            affected_rows: Some(affected_rows),
            ..Default::default()
        }
    }

    /// Failed result carrying only the error
    pub fn failed(error: impl Into<String>, execution_time: f64) -> Self {
        Self {
            execution_time,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
