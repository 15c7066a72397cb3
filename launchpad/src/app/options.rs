//! Application configuration options

use std::time::Duration;

use crate::session::SshOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{Settings, StorageBackend};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub server: ServerOptions,

    pub ssh: SshOptions,

    /// Port used for servers registered without one
    pub default_ssh_port: u16,

    pub github_api_base_url: String,

    pub storage: StorageOptions,

    /// Maximum wait for the HTTP server to drain on shutdown
    pub max_shutdown_delay: Duration,
}

impl AppOptions {
    /// Options from a settings file rooted at `layout`
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        let keepalive = match settings.ssh.keepalive_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            ssh: SshOptions {
                connect_timeout: Duration::from_secs(settings.ssh.connect_timeout_secs),
                keepalive_interval: keepalive,
            },
            default_ssh_port: settings.ssh.port,
            github_api_base_url: settings.github.api_base_url.clone(),
            storage: StorageOptions {
                layout,
                backend: settings.storage.backend,
            },
            ..Default::default()
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            server: ServerOptions::default(),
            ssh: SshOptions::default(),
            default_ssh_port: 22,
            github_api_base_url: "https://api.github.com".to_string(),
            storage: StorageOptions::default(),
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    pub layout: StorageLayout,
    pub backend: StorageBackend,
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
