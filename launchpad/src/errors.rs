//! Error types for launchpad

use thiserror::Error;

/// Main error type for launchpad
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// SSH authentication or transport failure. Never retried here.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Raised at a step boundary once the record was marked cancelled.
    #[error("Deployment cancelled")]
    Cancelled,

    #[error("{0}")]
    CloneAuthError(String),

    #[error("{0}")]
    CloneNotFoundError(String),

    #[error("{0}")]
    CloneGenericError(String),

    #[error("Deploy key error: {0}")]
    DeployKeyError(String),

    #[error("Remote command failed: {0}")]
    RemoteCommandError(String),

    #[error("System setup failed: {0}")]
    SystemSetupError(String),

    #[error("{0}")]
    BuildError(String),

    #[error("Process manager error: {0}")]
    ProcessManagerError(String),

    #[error("Nginx config invalid: {0}")]
    ConfigValidationError(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Storage error: {0}")]
    StoreError(String),

    #[error("GitHub error: {0}")]
    GitHubError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LaunchError {
    /// Whether this is the cancellation sentinel
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LaunchError::Cancelled)
    }
}

impl From<anyhow::Error> for LaunchError {
    fn from(err: anyhow::Error) -> Self {
        LaunchError::Internal(err.to_string())
    }
}

impl From<russh::Error> for LaunchError {
    fn from(err: russh::Error) -> Self {
        LaunchError::ConnectionError(err.to_string())
    }
}
