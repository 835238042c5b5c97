//! Project and shard registry
//!
//! Owns the registry state behind a single async lock. Readers get cloned
//! snapshots, so a concurrent `list_shards` never sees a half-applied change.
//! Every mutation bumps the state version and wakes registry watches.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metadata::{
    ProbeTelemetry, Project, ProjectSettings, ProjectStatus, RegistryState, RegistryStats,
    Shard, ShardStatus,
};
use crate::watch::RegistryWatcher;

/// Project and shard registry
pub struct Registry {
    state: RwLock<RegistryState>,
    watcher: RegistryWatcher,
    /// Probe outcomes applied; telemetry changes do not bump the version
    probes_applied: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::from_state(RegistryState::new())
    }

    /// Create registry from previously saved state
    pub fn from_state(state: RegistryState) -> Self {
        Self {
            watcher: RegistryWatcher::new(state.version),
            probes_applied: AtomicU64::new(0),
            state: RwLock::new(state),
        }
    }

    /// Copy of the full state, used for persistence
    pub async fn snapshot(&self) -> RegistryState {
        self.state.read().await.clone()
    }

    /// Current state version
    pub async fn version(&self) -> u64 {
        self.state.read().await.version
    }

    /// Number of probe outcomes applied so far
    pub fn probes_applied(&self) -> u64 {
        self.probes_applied.load(Ordering::Relaxed)
    }

    /// Get registry watch manager
    pub fn watcher(&self) -> &RegistryWatcher {
        &self.watcher
    }

    fn notify(&self, version: u64) {
        self.watcher.publish(version);
    }

    /// Create project
    pub async fn create_project(&self, name: &str, connection_string: &str) -> Result<Project> {
        let (project, version) = {
            let mut state = self.state.write().await;
            let project = state.create_project(name, connection_string)?;
            (project, state.version)
        };
        info!("Project {} ({}) created", project.id, project.name);
        self.notify(version);
        Ok(project)
    }

    /// Get project
    pub async fn get_project(&self, project_id: &str) -> Result<Project> {
        self.state.read().await.project(project_id)
    }

    /// Get all projects
    pub async fn list_projects(&self) -> Vec<Project> {
        self.state.read().await.projects()
    }

    /// Create shard
    pub async fn create_shard(
        &self,
        project_id: &str,
        hostname: &str,
        port: u32,
        database: &str,
    ) -> Result<Shard> {
        let (shard, version) = {
            let mut state = self.state.write().await;
            let shard = state.create_shard(project_id, hostname, port, database)?;
            (shard, state.version)
        };
        info!(
            "Shard {} ({}) added to project {}",
            shard.id,
            shard.address(),
            project_id
        );
        self.notify(version);
        Ok(shard)
    }

    /// Shards of a project in creation order
    ///
    /// Empty for a project without shards and for an unknown project.
    pub async fn list_shards(&self, project_id: &str) -> Vec<Shard> {
        self.state.read().await.project_shards(project_id)
    }

    /// Get shard
    pub async fn get_shard(&self, shard_id: &str) -> Result<Shard> {
        self.state.read().await.shard(shard_id)
    }

    /// All shards of all projects in creation order
    pub async fn all_shards(&self) -> Vec<Shard> {
        self.state.read().await.all_shards().to_vec()
    }

    /// Project and its shards read under one lock
    pub async fn project_with_shards(&self, project_id: &str) -> Result<(Project, Vec<Shard>)> {
        let state = self.state.read().await;
        let project = state.project(project_id)?;
        Ok((project, state.project_shards(project_id)))
    }

    /// Operator status change
    ///
    /// The only way a shard enters or leaves maintenance.
    pub async fn set_shard_status(&self, shard_id: &str, status: ShardStatus) -> Result<Shard> {
        let (shard, version) = {
            let mut state = self.state.write().await;
            let shard = state.set_shard_status(shard_id, status)?;
            (shard, state.version)
        };
        info!("Shard {} set to {} by operator", shard_id, status);
        self.notify(version);
        Ok(shard)
    }

    /// Operator status change
    pub async fn set_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
    ) -> Result<Project> {
        let (project, version) = {
            let mut state = self.state.write().await;
            let project = state.set_project_status(project_id, status)?;
            (project, state.version)
        };
        info!("Project {} set to {}", project_id, status);
        self.notify(version);
        Ok(project)
    }

    /// Update project settings
    pub async fn update_project_settings(
        &self,
        project_id: &str,
        connection_string: Option<&str>,
        settings: ProjectSettings,
    ) -> Result<Project> {
        let (project, version) = {
            let mut state = self.state.write().await;
            let project = state.update_settings(project_id, connection_string, settings)?;
            (project, state.version)
        };
        info!(
            "Project {} settings updated: strategy={}, shard_key={}, replication_factor={}",
            project_id,
            project.settings.sharding_strategy,
            project.settings.shard_key,
            project.settings.replication_factor
        );
        self.notify(version);
        Ok(project)
    }

    /// Record a probe outcome for one shard; `None` means the probe failed
    pub async fn record_probe(&self, shard_id: &str, outcome: Option<ProbeTelemetry>) {
        let (transition, version) = {
            let mut state = self.state.write().await;
            let transition = state.apply_probe(shard_id, outcome);
            if transition.is_some() {
                self.probes_applied.fetch_add(1, Ordering::Relaxed);
            }
            (transition, state.version)
        };

        match transition {
            Some((before, after)) if before != after => {
                warn!("Shard {} status changed: {} -> {}", shard_id, before, after);
                self.notify(version);
            }
            Some(_) => {}
            None => debug!("Probe result for removed shard {} dropped", shard_id),
        }
    }

    /// Registry statistics
    pub async fn stats(&self) -> RegistryStats {
        self.state.read().await.stats()
    }
}
