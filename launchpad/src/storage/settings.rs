//! Settings file management

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::LaunchError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Controller settings, read once at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines instead of plain text
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub ssh: SshSettings,

    #[serde(default)]
    pub github: GitHubSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl Settings {
    /// Load `file`, falling back to defaults when it does not exist
    pub async fn load(file: &File) -> Result<Self, LaunchError> {
        match file.read_json_opt::<Settings>().await {
            Ok(Some(settings)) => Ok(settings),
            Ok(None) => {
                info!(
                    "No settings file at {}, using defaults",
                    file.path().display()
                );
                Ok(Settings::default())
            }
            Err(e) => Err(LaunchError::ConfigError(format!(
                "{}: {}",
                file.path().display(),
                e
            ))),
        }
    }
}

/// HTTP API listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Outbound SSH connections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Port used when a server gives none
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// 0 disables keepalives
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_keepalive_interval() -> u64 {
    30
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
            keepalive_interval_secs: default_keepalive_interval(),
        }
    }
}

/// GitHub REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    #[serde(default = "default_github_api")]
    pub api_base_url: String,
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_github_api(),
        }
    }
}

/// Which store backs deployments and servers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
}
