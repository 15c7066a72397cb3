//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Port used when the caller gives none or an unparsable one
pub const DEFAULT_APP_PORT: u16 = 3000;

/// Application framework, drives install/build/start commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    Node,
    Next,
    Python,
    Static,
    Other,
}

impl Framework {
    /// Whether the project must ship a `package.json`
    pub fn requires_package_json(&self) -> bool {
        matches!(self, Framework::Node | Framework::Next)
    }
}

/// How the repository is accessed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// GitHub OAuth token, used to register an ephemeral deploy key
    Oauth,

    /// Anything else: token or username/password embedded in the URL
    #[default]
    #[serde(other)]
    Manual,
}

/// Caller-supplied deployment request
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    pub app_name: String,

    pub repo_url: String,

    #[serde(default)]
    pub branch: String,

    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    #[serde(default)]
    pub git_username: Option<String>,

    #[serde(default, skip_serializing)]
    pub git_password: Option<String>,

    #[serde(default)]
    pub auth_type: AuthType,

    /// Raw port text; see [`DeployConfig::port`]
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<String>,

    #[serde(default)]
    pub start_command: Option<String>,

    #[serde(default)]
    pub build_command: Option<String>,

    #[serde(default)]
    pub entry_file: Option<String>,

    /// Subdirectory of the repository holding the application
    #[serde(default)]
    pub root_directory: Option<String>,

    /// Domain or IP used as nginx `server_name`
    #[serde(default)]
    pub domain: Option<String>,

    /// Raw `.env` contents
    #[serde(default)]
    pub env_vars: Option<String>,

    #[serde(default)]
    pub framework: Framework,

    /// Contact address for certbot registration
    #[serde(default)]
    pub ssl_email: Option<String>,
}

impl DeployConfig {
    /// Branch to deploy, `main` when unset
    pub fn branch(&self) -> &str {
        match self.branch.trim() {
            "" => "main",
            branch => branch,
        }
    }

    /// Application port parsed from the raw text
    pub fn port(&self) -> u16 {
        self.port
            .as_deref()
            .and_then(|p| p.trim().parse::<u16>().ok())
            .filter(|p| *p != 0)
            .unwrap_or(DEFAULT_APP_PORT)
    }

    /// Trimmed domain, if any
    pub fn domain(&self) -> Option<&str> {
        non_empty(self.domain.as_deref())
    }

    pub fn token(&self) -> Option<&str> {
        non_empty(self.token.as_deref())
    }

    pub fn start_command(&self) -> Option<&str> {
        non_empty(self.start_command.as_deref())
    }

    pub fn build_command(&self) -> Option<&str> {
        non_empty(self.build_command.as_deref())
    }

    pub fn entry_file(&self) -> Option<&str> {
        non_empty(self.entry_file.as_deref())
    }

    pub fn env_vars(&self) -> Option<&str> {
        non_empty(self.env_vars.as_deref())
    }

    /// Username and password, only when both are present
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (
            non_empty(self.git_username.as_deref()),
            non_empty(self.git_password.as_deref()),
        ) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("DeployConfig")
            .field("app_name", &self.app_name)
            .field("repo_url", &crate::utils::redact_url(&self.repo_url))
            .field("branch", &self.branch)
            .field("token", &redact(&self.token))
            .field("git_username", &self.git_username)
            .field("git_password", &redact(&self.git_password))
            .field("auth_type", &self.auth_type)
            .field("port", &self.port)
            .field("framework", &self.framework)
            .field("domain", &self.domain)
            .field("root_directory", &self.root_directory)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Text(String),
        Number(u64),
    }

    Ok(Option::<RawPort>::deserialize(deserializer)?.map(|raw| match raw {
        RawPort::Text(text) => text,
        RawPort::Number(n) => n.to_string(),
    }))
}

/// The fixed step catalog, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepName {
    #[serde(rename = "System Setup")]
    SystemSetup,
    #[serde(rename = "Directory & Backup")]
    DirectoryBackup,
    #[serde(rename = "Clone Repository")]
    CloneRepository,
    #[serde(rename = "Install & Build")]
    InstallBuild,
    #[serde(rename = "Start Application")]
    StartApplication,
    #[serde(rename = "Configure Nginx")]
    ConfigureNginx,
    #[serde(rename = "SSL Certificate")]
    SslCertificate,
}

impl StepName {
    pub const ALL: [StepName; 7] = [
        StepName::SystemSetup,
        StepName::DirectoryBackup,
        StepName::CloneRepository,
        StepName::InstallBuild,
        StepName::StartApplication,
        StepName::ConfigureNginx,
        StepName::SslCertificate,
    ];

    /// Position in the pipeline
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepName::SystemSetup => "System Setup",
            StepName::DirectoryBackup => "Directory & Backup",
            StepName::CloneRepository => "Clone Repository",
            StepName::InstallBuild => "Install & Build",
            StepName::StartApplication => "Start Application",
            StepName::ConfigureNginx => "Configure Nginx",
            StepName::SslCertificate => "SSL Certificate",
        }
    }

    /// Failure of a fatal step aborts the pipeline
    pub fn is_fatal(&self) -> bool {
        self.index() <= StepName::StartApplication.index()
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl StepStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Failure)
    }
}

/// One pipeline step as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: StepName,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Step {
    pub fn pending(name: StepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            details: None,
        }
    }
}

/// Overall deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeploymentStatus {
    Running,
    Success,
    Failed,
    Cancelled,
}

impl DeploymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeploymentStatus::Running)
    }
}

/// A deployment as kept by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: String,

    /// Target server host
    pub server_host: String,

    /// Target server login user
    pub server_user: String,

    /// Sanitized application name
    pub app_name: String,

    pub repo_url: String,

    pub branch: String,

    pub port: u16,

    pub framework: Framework,

    #[serde(default)]
    pub domain: Option<String>,

    pub status: DeploymentStatus,

    pub steps: Vec<Step>,

    /// Append-only log text
    #[serde(default)]
    pub logs: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Partial update applied by the store
#[derive(Debug, Clone, Default)]
pub struct DeploymentPatch {
    pub status: Option<DeploymentStatus>,
    pub steps: Option<Vec<Step>>,
    /// Appended to `logs`, never replaces them
    pub append_log: Option<String>,
}

impl DeploymentPatch {
    pub fn status(status: DeploymentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn steps(steps: Vec<Step>) -> Self {
        Self {
            steps: Some(steps),
            ..Default::default()
        }
    }

    pub fn log(line: impl Into<String>) -> Self {
        Self {
            append_log: Some(line.into()),
            ..Default::default()
        }
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.append_log = Some(line.into());
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = Some(steps);
        self
    }
}

/// Outcome handed back to the caller of a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub success: bool,
    pub message: String,
    pub logs: String,
    pub steps: Vec<Step>,
    pub deploy_id: String,
}
