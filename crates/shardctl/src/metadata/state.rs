//! Registry state
//!
//! Plain data owned by the registry lock. Every mutation goes through a method
//! here so the version counter and `updated_at` stay in step with the data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::project::ProjectRecord;
use super::{ProbeTelemetry, Project, ProjectSettings, ProjectStatus, Shard, ShardStatus};
use crate::error::{ControlError, Result};

/// Complete registry state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryState {
    /// Incremented on each change
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    /// Projects in creation order
    projects: Vec<ProjectRecord>,
    /// Shards of all projects in creation order
    shards: Vec<Shard>,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryState {
    /// Create empty state
    pub fn new() -> Self {
        Self {
            version: 0,
            updated_at: Utc::now(),
            projects: Vec::new(),
            shards: Vec::new(),
        }
    }

    /// Update timestamp and version
    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    fn project_record(&self, project_id: &str) -> Result<&ProjectRecord> {
        self.projects
            .iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| ControlError::project_not_found(project_id))
    }

    fn project_record_mut(&mut self, project_id: &str) -> Result<&mut ProjectRecord> {
        self.projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| ControlError::project_not_found(project_id))
    }

    fn shard_mut(&mut self, shard_id: &str) -> Result<&mut Shard> {
        self.shards
            .iter_mut()
            .find(|s| s.id == shard_id)
            .ok_or_else(|| ControlError::shard_not_found(shard_id))
    }

    /// Number of shards owned by a project
    pub fn shard_count(&self, project_id: &str) -> usize {
        self.shards.iter().filter(|s| s.project_id == project_id).count()
    }

    /// Create project
    pub fn create_project(&mut self, name: &str, connection_string: &str) -> Result<Project> {
        let name = name.trim();
        let connection_string = connection_string.trim();
        if name.is_empty() {
            return Err(ControlError::Validation("project name must not be empty".to_string()));
        }
        if connection_string.is_empty() {
            return Err(ControlError::Validation(
                "connection string must not be empty".to_string(),
            ));
        }

        let record = ProjectRecord::new(
            Uuid::new_v4().simple().to_string(),
            name.to_string(),
            connection_string.to_string(),
        );
        let project = record.to_project(0);
        self.projects.push(record);
        self.touch();
        Ok(project)
    }

    /// Look up project
    pub fn project(&self, project_id: &str) -> Result<Project> {
        let record = self.project_record(project_id)?;
        Ok(record.to_project(self.shard_count(project_id)))
    }

    /// All projects in creation order
    pub fn projects(&self) -> Vec<Project> {
        self.projects
            .iter()
            .map(|p| p.to_project(self.shard_count(&p.id)))
            .collect()
    }

    /// Create shard
    ///
    /// # Returns
    /// - Ok(Shard): new online shard with zeroed telemetry
    /// - Err(NotFound): project does not exist
    /// - Err(Validation): empty hostname/database or port 0
    pub fn create_shard(
        &mut self,
        project_id: &str,
        hostname: &str,
        port: u32,
        database: &str,
    ) -> Result<Shard> {
        self.project_record(project_id)?;

        let hostname = hostname.trim();
        let database = database.trim();
        if hostname.is_empty() {
            return Err(ControlError::Validation("hostname must not be empty".to_string()));
        }
        if database.is_empty() {
            return Err(ControlError::Validation("database must not be empty".to_string()));
        }
        let port = match u16::try_from(port) {
            Ok(port) if port > 0 => port,
            _ => {
                return Err(ControlError::Validation(format!(
                    "port must be between 1 and 65535, got {}",
                    port
                )))
            }
        };

        let shard = Shard::new(
            format!("shard-{}", Uuid::new_v4().simple()),
            project_id.to_string(),
            hostname.to_string(),
            port,
            database.to_string(),
        );
        self.shards.push(shard.clone());
        self.touch();
        Ok(shard)
    }

    /// Look up shard
    pub fn shard(&self, shard_id: &str) -> Result<Shard> {
        self.shards
            .iter()
            .find(|s| s.id == shard_id)
            .cloned()
            .ok_or_else(|| ControlError::shard_not_found(shard_id))
    }

    /// Shards of a project in creation order
    pub fn project_shards(&self, project_id: &str) -> Vec<Shard> {
        self.shards
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect()
    }

    /// All shards in creation order
    pub fn all_shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Operator status change
    pub fn set_shard_status(&mut self, shard_id: &str, status: ShardStatus) -> Result<Shard> {
        let shard = self.shard_mut(shard_id)?;
        shard.status = status;
        let shard = shard.clone();
        self.touch();
        Ok(shard)
    }

    /// Operator status change
    pub fn set_project_status(
        &mut self,
        project_id: &str,
        status: ProjectStatus,
    ) -> Result<Project> {
        self.project_record_mut(project_id)?.status = status;
        self.touch();
        self.project(project_id)
    }

    /// Replace project settings and optionally the connection string
    pub fn update_settings(
        &mut self,
        project_id: &str,
        connection_string: Option<&str>,
        settings: ProjectSettings,
    ) -> Result<Project> {
        settings.validate().map_err(ControlError::Validation)?;
        let connection_string = match connection_string.map(str::trim) {
            Some("") => {
                return Err(ControlError::Validation(
                    "connection string must not be empty".to_string(),
                ))
            }
            other => other,
        };

        let record = self.project_record_mut(project_id)?;
        if let Some(connection_string) = connection_string {
            record.connection_string = connection_string.to_string();
        }
        record.settings = settings;
        self.touch();
        self.project(project_id)
    }

    /// Apply a probe outcome; `None` means the probe failed
    ///
    /// Returns the shard's status before and after, or None if the shard no
    /// longer exists.
    pub fn apply_probe(
        &mut self,
        shard_id: &str,
        outcome: Option<ProbeTelemetry>,
    ) -> Option<(ShardStatus, ShardStatus)> {
        let shard = self.shards.iter_mut().find(|s| s.id == shard_id)?;
        let before = shard.status;
        match outcome {
            Some(telemetry) => shard.record_probe_success(telemetry),
            None => shard.record_probe_failure(),
        }
        let after = shard.status;
        if before != after {
            self.touch();
        }
        Some((before, after))
    }

    /// Registry statistics
    pub fn stats(&self) -> RegistryStats {
        let count = |status: ShardStatus| self.shards.iter().filter(|s| s.status == status).count();

        RegistryStats {
            total_projects: self.projects.len(),
            active_projects: self
                .projects
                .iter()
                .filter(|p| p.status == ProjectStatus::Active)
                .count(),
            total_shards: self.shards.len(),
            online_shards: count(ShardStatus::Online),
            offline_shards: count(ShardStatus::Offline),
            maintenance_shards: count(ShardStatus::Maintenance),
            version: self.version,
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_projects: usize,
    pub active_projects: usize,
    pub total_shards: usize,
    pub online_shards: usize,
    pub offline_shards: usize,
    pub maintenance_shards: usize,
    pub version: u64,
}
