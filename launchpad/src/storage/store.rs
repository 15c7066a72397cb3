//! Deployment and server store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::deploy::fsm::DeploymentFsm;
use crate::errors::LaunchError;
use crate::models::deployment::{DeploymentPatch, DeploymentRecord};
use crate::models::server::ServerRecord;
use crate::utils::generate_uuid;

/// Persistence used by the orchestrator and the API
#[async_trait]
pub trait Store: Send + Sync {
    async fn create(&self, record: DeploymentRecord) -> Result<(), LaunchError>;

    /// Apply `patch` to the record `id` and return the updated record.
    ///
    /// A terminal status is never replaced, so a late `FAILED` cannot
    /// overwrite `CANCELLED`.
    async fn update(
        &self,
        id: &str,
        patch: DeploymentPatch,
    ) -> Result<DeploymentRecord, LaunchError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<DeploymentRecord>, LaunchError>;

    /// Deployments to `host` as `user`, newest first
    async fn find_by_host_and_user(
        &self,
        host: &str,
        user: &str,
    ) -> Result<Vec<DeploymentRecord>, LaunchError>;

    /// Insert or replace the server with the same host and username
    async fn save_server(&self, server: ServerRecord) -> Result<ServerRecord, LaunchError>;

    async fn find_server(
        &self,
        host: &str,
        username: &str,
    ) -> Result<Option<ServerRecord>, LaunchError>;
}

/// Apply a patch in place. Logs are appended, steps replaced, and the status
/// only moves along the deployment state machine.
pub fn apply_patch(record: &mut DeploymentRecord, patch: DeploymentPatch) {
    if let Some(line) = patch.append_log {
        record.logs.push_str(&line);
    }
    if let Some(steps) = patch.steps {
        record.steps = steps;
    }
    if let Some(status) = patch.status {
        match DeploymentFsm::check(record.status, status) {
            Ok(()) => record.status = status,
            Err(e) => warn!("Deployment {}: keeping status, {}", record.id, e),
        }
    }
    record.updated_at = Utc::now();
}

/// Give a new server an ID, or reuse the one already stored for its login
pub(crate) fn assign_server_id(server: &mut ServerRecord, existing: Option<&ServerRecord>) {
    match existing {
        Some(prev) => server.id = prev.id.clone(),
        None if server.id.is_empty() => server.id = generate_uuid(),
        None => {}
    }
}

/// Process-local store, lost on restart
#[derive(Default)]
pub struct MemoryStore {
    deployments: RwLock<HashMap<String, DeploymentRecord>>,
    servers: RwLock<HashMap<String, ServerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create(&self, record: DeploymentRecord) -> Result<(), LaunchError> {
        let mut deployments = self.deployments.write().unwrap_or_else(|e| e.into_inner());
        if deployments.contains_key(&record.id) {
            return Err(LaunchError::StoreError(format!(
                "Deployment {} already exists",
                record.id
            )));
        }
        deployments.insert(record.id.clone(), record);
        Ok(())
    }

    async fn update(
        &self,
        id: &str,
        patch: DeploymentPatch,
    ) -> Result<DeploymentRecord, LaunchError> {
        let mut deployments = self.deployments.write().unwrap_or_else(|e| e.into_inner());
        let record = deployments
            .get_mut(id)
            .ok_or_else(|| LaunchError::NotFound(format!("deployment {}", id)))?;
        apply_patch(record, patch);
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DeploymentRecord>, LaunchError> {
        let deployments = self.deployments.read().unwrap_or_else(|e| e.into_inner());
        Ok(deployments.get(id).cloned())
    }

    async fn find_by_host_and_user(
        &self,
        host: &str,
        user: &str,
    ) -> Result<Vec<DeploymentRecord>, LaunchError> {
        let deployments = self.deployments.read().unwrap_or_else(|e| e.into_inner());
        let mut found: Vec<DeploymentRecord> = deployments
            .values()
            .filter(|d| d.server_host == host && d.server_user == user)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn save_server(&self, mut server: ServerRecord) -> Result<ServerRecord, LaunchError> {
        let mut servers = self.servers.write().unwrap_or_else(|e| e.into_inner());
        let existing = servers
            .values()
            .find(|s| s.host == server.host && s.username == server.username)
            .cloned();
        assign_server_id(&mut server, existing.as_ref());
        servers.insert(server.id.clone(), server.clone());
        Ok(server)
    }

    async fn find_server(
        &self,
        host: &str,
        username: &str,
    ) -> Result<Option<ServerRecord>, LaunchError> {
        let servers = self.servers.read().unwrap_or_else(|e| e.into_inner());
        Ok(servers
            .values()
            .find(|s| s.host == host && s.username == username)
            .cloned())
    }
}
