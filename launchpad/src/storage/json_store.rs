//! Store backed by one JSON file per record

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::errors::LaunchError;
use crate::filesys::file::File;
use crate::models::deployment::{DeploymentPatch, DeploymentRecord};
use crate::models::server::ServerRecord;
use crate::storage::layout::StorageLayout;
use crate::storage::store::{apply_patch, assign_server_id, Store};

/// Records live under `deployments/<id>.json` and `servers/<id>.json`
pub struct JsonFileStore {
    layout: StorageLayout,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            layout,
            write_lock: Mutex::new(()),
        }
    }

    fn deployment_file(&self, id: &str) -> Result<File, LaunchError> {
        validate_id(id)?;
        Ok(self.layout.deployments_dir().file(&format!("{}.json", id)))
    }

    async fn all_deployments(&self) -> Result<Vec<DeploymentRecord>, LaunchError> {
        let mut records = Vec::new();
        for file in self.layout.deployments_dir().list_files("json").await? {
            match file.read_json::<DeploymentRecord>().await {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable {}: {}", file.path().display(), e),
            }
        }
        Ok(records)
    }

    async fn all_servers(&self) -> Result<Vec<ServerRecord>, LaunchError> {
        let mut servers = Vec::new();
        for file in self.layout.servers_dir().list_files("json").await? {
            match file.read_json::<ServerRecord>().await {
                Ok(server) => servers.push(server),
                Err(e) => warn!("Skipping unreadable {}: {}", file.path().display(), e),
            }
        }
        Ok(servers)
    }
}

/// IDs become file names
fn validate_id(id: &str) -> Result<(), LaunchError> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(LaunchError::ValidationError(format!("Invalid record ID: {}", id)));
    }
    Ok(())
}

#[async_trait]
impl Store for JsonFileStore {
    async fn create(&self, record: DeploymentRecord) -> Result<(), LaunchError> {
        let _guard = self.write_lock.lock().await;
        let file = self.deployment_file(&record.id)?;
        if file.exists().await {
            return Err(LaunchError::StoreError(format!(
                "Deployment {} already exists",
                record.id
            )));
        }
        file.write_json(&record).await
    }

    async fn update(
        &self,
        id: &str,
        patch: DeploymentPatch,
    ) -> Result<DeploymentRecord, LaunchError> {
        let _guard = self.write_lock.lock().await;
        let file = self.deployment_file(id)?;
        let mut record: DeploymentRecord = file
            .read_json_opt()
            .await?
            .ok_or_else(|| LaunchError::NotFound(format!("deployment {}", id)))?;
        apply_patch(&mut record, patch);
        file.write_json(&record).await?;
        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<DeploymentRecord>, LaunchError> {
        self.deployment_file(id)?.read_json_opt().await
    }

    async fn find_by_host_and_user(
        &self,
        host: &str,
        user: &str,
    ) -> Result<Vec<DeploymentRecord>, LaunchError> {
        let mut found: Vec<DeploymentRecord> = self
            .all_deployments()
            .await?
            .into_iter()
            .filter(|d| d.server_host == host && d.server_user == user)
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn save_server(&self, mut server: ServerRecord) -> Result<ServerRecord, LaunchError> {
        let _guard = self.write_lock.lock().await;
        let existing = self
            .all_servers()
            .await?
            .into_iter()
            .find(|s| s.host == server.host && s.username == server.username);
        assign_server_id(&mut server, existing.as_ref());
        validate_id(&server.id)?;
        self.layout
            .servers_dir()
            .file(&format!("{}.json", server.id))
            .write_json(&server)
            .await?;
        Ok(server)
    }

    async fn find_server(
        &self,
        host: &str,
        username: &str,
    ) -> Result<Option<ServerRecord>, LaunchError> {
        Ok(self
            .all_servers()
            .await?
            .into_iter()
            .find(|s| s.host == host && s.username == username))
    }
}
