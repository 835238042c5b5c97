//! Registry snapshot file
//!
//! Optional: only used when a data directory is configured. The whole
//! registry state is written as one JSON document.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::metadata::RegistryState;

const SNAPSHOT_FILE: &str = "registry.json";

/// Storage error
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Registry snapshot file in a data directory
pub struct FileStorage {
    data_dir: PathBuf,
    path: PathBuf,
    /// Held across write and rename; holds the last version written
    written: Mutex<Option<u64>>,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let path = data_dir.join(SNAPSHOT_FILE);
        Self {
            data_dir,
            path,
            written: Mutex::new(None),
        }
    }

    /// Read the snapshot, `None` if there is none yet
    pub async fn load(&self) -> Result<Option<RegistryState>, StorageError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No registry snapshot at {:?}, starting empty", self.path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let state: RegistryState = serde_json::from_str(&content)?;

        let stats = state.stats();
        info!(
            "Loaded registry: {} projects, {} shards, version {}",
            stats.total_projects, stats.total_shards, state.version
        );
        *self.written.lock().await = Some(state.version);
        Ok(Some(state))
    }

    pub async fn load_or_default(&self) -> Result<RegistryState, StorageError> {
        Ok(self.load().await?.unwrap_or_default())
    }

    /// Write a snapshot through a temp file and rename
    ///
    /// Saves are serialized. A snapshot older than the last one written is
    /// dropped so a slow writer cannot replace newer data.
    pub async fn save(&self, state: &RegistryState) -> Result<(), StorageError> {
        let mut written = self.written.lock().await;
        if matches!(*written, Some(v) if state.version < v) {
            debug!(
                "Dropping registry snapshot version {}, version {:?} already written",
                state.version, *written
            );
            return Ok(());
        }

        fs::create_dir_all(&self.data_dir).await?;
        let content = serde_json::to_vec_pretty(state)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.path).await?;

        *written = Some(state.version);
        debug!("Saved registry version {} to {:?}", state.version, self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ShardStatus;
    use std::sync::Arc;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("shardctl_{}_{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = temp_dir("save_load");
        let storage = FileStorage::new(&dir);
        assert!(storage.load().await.unwrap().is_none());

        let mut state = storage.load_or_default().await.unwrap();
        let project = state.create_project("orders", "postgres://db/orders").unwrap();
        let shard = state.create_shard(&project.id, "db1", 5432, "orders_1").unwrap();
        state.set_shard_status(&shard.id, ShardStatus::Maintenance).unwrap();
        storage.save(&state).await.unwrap();

        let loaded = FileStorage::new(&dir).load().await.unwrap().unwrap();
        assert_eq!(loaded.version, state.version);
        assert_eq!(loaded.project(&project.id).unwrap().shard_count, 1);
        assert_eq!(loaded.shard(&shard.id).unwrap().status, ShardStatus::Maintenance);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_keep_newest() {
        let dir = temp_dir("concurrent");
        let storage = Arc::new(FileStorage::new(&dir));

        let mut snapshots = Vec::new();
        let mut state = RegistryState::new();
        for i in 0..8 {
            state.create_project(&format!("p{}", i), "dsn").unwrap();
            snapshots.push(state.clone());
        }
        let newest = state.version;

        for _ in 0..10 {
            let mut handles = Vec::new();
            for snapshot in snapshots.iter().rev().cloned() {
                let storage = storage.clone();
                handles.push(tokio::spawn(async move { storage.save(&snapshot).await }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        }

        let loaded = FileStorage::new(&dir).load().await.unwrap().unwrap();
        assert_eq!(loaded.version, newest);
        assert_eq!(loaded.projects().len(), 8);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
