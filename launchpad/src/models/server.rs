//! Target server models

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::session::client::Credentials;

/// Default SSH port of a target server
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A deployment target reachable over SSH with password authentication
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    /// Unique server ID
    #[serde(default)]
    pub id: String,

    /// Hostname or IP address
    pub host: String,

    /// SSH port, 0 when not given
    #[serde(default)]
    pub port: u16,

    /// Login user
    pub username: String,

    /// Login password
    pub password: String,
}

impl ServerRecord {
    /// Build connection credentials for this server
    pub fn credentials(&self) -> Credentials {
        Credentials {
            host: self.host.clone(),
            port: self.ssh_port(),
            username: self.username.clone(),
            password: SecretString::from(self.password.clone()),
        }
    }

    /// Port to connect to, [`DEFAULT_SSH_PORT`] when unset
    pub fn ssh_port(&self) -> u16 {
        match self.port {
            0 => DEFAULT_SSH_PORT,
            port => port,
        }
    }

    /// Summary safe to hand back to API callers
    pub fn summary(&self) -> ServerSummary {
        ServerSummary {
            id: self.id.clone(),
            host: self.host.clone(),
            port: self.ssh_port(),
            username: self.username.clone(),
        }
    }
}

impl std::fmt::Debug for ServerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRecord")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Server without its secret
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
}
