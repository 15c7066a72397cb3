//! Application state management

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::pipeline::Orchestrator;
use crate::errors::LaunchError;
use crate::http::github::{GitHubApi, GitHubClient};
use crate::session::{Connector, SessionRegistry, SshConnector};
use crate::storage::settings::StorageBackend;
use crate::storage::{JsonFileStore, MemoryStore, Store};

/// Shared state of the controller
pub struct AppState {
    pub registry: Arc<SessionRegistry>,

    pub store: Arc<dyn Store>,

    pub github: Arc<dyn GitHubApi>,

    pub orchestrator: Arc<Orchestrator>,

    /// Port used for servers registered without one
    pub default_ssh_port: u16,

    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire state from explicit collaborators
    pub fn new(
        connector: Arc<dyn Connector>,
        store: Arc<dyn Store>,
        github: Arc<dyn GitHubApi>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(connector));
        let orchestrator = Arc::new(Orchestrator::new(
            registry.clone(),
            store.clone(),
            github.clone(),
        ));
        Self {
            registry,
            store,
            github,
            orchestrator,
            default_ssh_port: 22,
            started_at: Utc::now(),
        }
    }

    /// Build the production state: SSH connector, configured store, GitHub client
    pub async fn init(options: &AppOptions) -> Result<Self, LaunchError> {
        info!("Initializing application state...");

        let store: Arc<dyn Store> = match options.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::File => {
                options.storage.layout.setup().await?;
                Arc::new(JsonFileStore::new(options.storage.layout.clone()))
            }
        };
        let github: Arc<dyn GitHubApi> =
            Arc::new(GitHubClient::new(&options.github_api_base_url)?);
        let connector: Arc<dyn Connector> = Arc::new(SshConnector::new(options.ssh.clone()));

        let mut state = Self::new(connector, store, github);
        state.default_ssh_port = options.default_ssh_port;
        Ok(state)
    }

    /// Close every open SSH session
    pub async fn shutdown(&self) -> Result<(), LaunchError> {
        info!("Shutting down application state...");
        let closed = self.registry.close_all().await;
        info!("Closed {} SSH session(s)", closed);
        Ok(())
    }
}
