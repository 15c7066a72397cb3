//! Deployment orchestrator
//!
//! A run is one sequential task over its own SSH session (`deploy_<id>`).
//! Steps before nginx are fatal; nginx and SSL failures are recorded and the
//! run continues. Cancellation is checked against the store before every step.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::deploy::credentials::{self, CloneSource};
use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm};
use crate::deploy::steps::StepBoard;
use crate::deploy::{certbot, git, host, install, nginx, pm2, project_dir, sudo_prefix, tail, teardown};
use crate::errors::LaunchError;
use crate::http::github::GitHubApi;
use crate::models::deployment::{
    DeployConfig, DeployResult, DeploymentPatch, DeploymentRecord, DeploymentStatus, StepName,
    StepStatus,
};
use crate::models::server::ServerRecord;
use crate::session::client::Credentials;
use crate::session::{execute, SessionRegistry};
use crate::storage::Store;
use crate::utils::{generate_uuid, redact_url, sanitize_app_name, unix_secs};

pub const SUCCESS_MESSAGE: &str = "Deployment successful";
pub const CANCELLED_MESSAGE: &str = "Deployment cancelled";
pub const STOPPED_LOG_LINE: &str = "[SYSTEM] Deployment stopped by user";

/// Session key of a deployment run
pub fn run_session_key(deploy_id: &str) -> String {
    format!("deploy_{}", deploy_id)
}

/// Session key used to tear down after a stop
pub fn teardown_session_key(deploy_id: &str) -> String {
    format!("teardown_{}", deploy_id)
}

/// `[HH:MM:SS] message` plus newline
fn stamp(message: &str) -> String {
    format!("[{}] {}\n", Utc::now().format("%H:%M:%S"), message)
}

/// Reject requests that cannot be deployed safely
pub fn validate_config(config: &DeployConfig) -> Result<(), LaunchError> {
    if sanitize_app_name(&config.app_name).trim_matches('-').is_empty() {
        return Err(LaunchError::ValidationError(
            "appName must contain at least one letter or digit".to_string(),
        ));
    }
    if config.repo_url.trim().is_empty() {
        return Err(LaunchError::ValidationError("repoUrl is required".to_string()));
    }
    if let Some(root) = config.root_directory.as_deref() {
        let valid_chars = root
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
        if !valid_chars || root.split('/').any(|segment| segment == "..") {
            return Err(LaunchError::ValidationError(format!(
                "Invalid rootDirectory: {}",
                root
            )));
        }
    }
    Ok(())
}

/// Drives deployments and app operations against remote servers
pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn Store>,
    github: Arc<dyn GitHubApi>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn Store>,
        github: Arc<dyn GitHubApi>,
    ) -> Self {
        Self {
            registry,
            store,
            github,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Validate the request and persist a `RUNNING` record with all steps pending
    pub async fn create_deployment(
        &self,
        server: &ServerRecord,
        config: &DeployConfig,
    ) -> Result<DeploymentRecord, LaunchError> {
        validate_config(config)?;
        let now = Utc::now();
        let record = DeploymentRecord {
            id: generate_uuid(),
            server_host: server.host.clone(),
            server_user: server.username.clone(),
            app_name: sanitize_app_name(&config.app_name),
            repo_url: redact_url(&config.repo_url),
            branch: config.branch().to_string(),
            port: config.port(),
            framework: config.framework,
            domain: config.domain().map(str::to_string),
            status: DeploymentStatus::Running,
            steps: StepBoard::new().snapshot(),
            logs: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.create(record.clone()).await?;
        info!(
            "Created deployment {} of {} to {}@{}",
            record.id, record.app_name, record.server_user, record.server_host
        );
        Ok(record)
    }

    /// Create a deployment and run it to completion
    pub async fn deploy(
        &self,
        server: &ServerRecord,
        config: &DeployConfig,
    ) -> Result<DeployResult, LaunchError> {
        let record = self.create_deployment(server, config).await?;
        Ok(self.run(&record.id, server, config).await)
    }

    /// Run the pipeline for an existing record. Never fails: every outcome is
    /// reported through the result and the stored record.
    pub async fn run(
        &self,
        deploy_id: &str,
        server: &ServerRecord,
        config: &DeployConfig,
    ) -> DeployResult {
        let mut run = Run::new(self, deploy_id, server, config);
        info!("[{}] Deploying {} to {}", deploy_id, run.app, server.host);
        run.log(&format!(
            "Deploying {} ({}) from {}",
            run.app,
            config.branch(),
            redact_url(&config.repo_url)
        ))
        .await;

        let result = run.steps().await;
        run.conclude(result).await
    }

    /// Mark the deployment cancelled, drop its sessions and remove the app.
    ///
    /// Everything after the lookup is best-effort.
    pub async fn stop(&self, deploy_id: &str) -> Result<DeploymentRecord, LaunchError> {
        let record = self
            .store
            .find_by_id(deploy_id)
            .await?
            .ok_or_else(|| LaunchError::NotFound(format!("deployment {}", deploy_id)))?;

        let patch = DeploymentPatch::status(DeploymentStatus::Cancelled).with_log(stamp(STOPPED_LOG_LINE));
        let record = match self.store.update(deploy_id, patch).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!("[{}] Failed to mark deployment cancelled: {}", deploy_id, e);
                record
            }
        };

        let closed = self.registry.close_matching(deploy_id).await;
        info!("[{}] Stop requested, closed {} session(s)", deploy_id, closed);

        match self
            .store
            .find_server(&record.server_host, &record.server_user)
            .await
        {
            Ok(Some(server)) => {
                let key = teardown_session_key(deploy_id);
                if let Err(e) = self.teardown_with(&key, &server, &record.app_name).await {
                    warn!("[{}] Teardown failed: {}", deploy_id, e);
                }
                self.registry.close(&key).await;
            }
            Ok(None) => warn!(
                "[{}] No stored login for {}@{}, skipping teardown",
                deploy_id, record.server_user, record.server_host
            ),
            Err(e) => warn!("[{}] Server lookup failed, skipping teardown: {}", deploy_id, e),
        }

        Ok(record)
    }

    /// Remove an app from a server; returns teardown warnings
    pub async fn delete_app(
        &self,
        server: &ServerRecord,
        app_name: &str,
    ) -> Result<Vec<String>, LaunchError> {
        let key = server.credentials().terminal_key();
        self.teardown_with(&key, server, &sanitize_app_name(app_name))
            .await
    }

    /// `pm2 restart` the app and return its output
    pub async fn restart_app(
        &self,
        server: &ServerRecord,
        app_name: &str,
    ) -> Result<String, LaunchError> {
        let app = sanitize_app_name(app_name);
        let output = self
            .exec_on(server, &pm2::restart_command(&app))
            .await?;
        pm2::classify_output(&output)?;
        info!("Restarted {} on {}", app, server.host);
        Ok(output)
    }

    /// Last `lines` lines of the app's pm2 logs
    pub async fn app_logs(
        &self,
        server: &ServerRecord,
        app_name: &str,
        lines: u32,
    ) -> Result<String, LaunchError> {
        let app = sanitize_app_name(app_name);
        let output = self.exec_on(server, &pm2::logs_command(&app, lines)).await?;
        pm2::classify_output(&output)?;
        Ok(output)
    }

    async fn exec_on(&self, server: &ServerRecord, command: &str) -> Result<String, LaunchError> {
        let credentials = server.credentials();
        let session = self
            .registry
            .get_or_create(&credentials.terminal_key(), &credentials)
            .await?;
        execute(&session, command).await
    }

    async fn teardown_with(
        &self,
        key: &str,
        server: &ServerRecord,
        app_name: &str,
    ) -> Result<Vec<String>, LaunchError> {
        let session = self
            .registry
            .get_or_create(key, &server.credentials())
            .await?;
        teardown::teardown_app(&session, app_name, sudo_prefix(&server.username)).await
    }
}

/// State of one pipeline run
struct Run<'a> {
    orchestrator: &'a Orchestrator,
    config: &'a DeployConfig,
    id: String,
    session_key: String,
    credentials: Credentials,
    username: String,
    sudo: &'static str,
    app: String,
    /// Directory the repository is cloned into
    project_dir: String,
    /// Directory the app is installed, built and started from
    work_dir: String,
    board: StepBoard,
    logs: String,
    /// Values scrubbed from every log line
    secrets: Vec<String>,
}

impl<'a> Run<'a> {
    fn new(
        orchestrator: &'a Orchestrator,
        deploy_id: &str,
        server: &ServerRecord,
        config: &'a DeployConfig,
    ) -> Self {
        let app = sanitize_app_name(&config.app_name);
        let dir = project_dir(&app);
        let work_dir = match config
            .root_directory
            .as_deref()
            .map(|r| r.trim().trim_matches('/'))
            .filter(|r| !r.is_empty() && *r != ".")
        {
            Some(root) => format!("{}/{}", dir, root),
            None => dir.clone(),
        };

        let secrets = [
            config.token.as_deref(),
            config.git_password.as_deref(),
            Some(server.password.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

        Self {
            orchestrator,
            config,
            id: deploy_id.to_string(),
            session_key: run_session_key(deploy_id),
            credentials: server.credentials(),
            username: server.username.clone(),
            sudo: sudo_prefix(&server.username),
            app,
            project_dir: dir,
            work_dir,
            board: StepBoard::new(),
            logs: String::new(),
            secrets,
        }
    }

    fn scrub(&self, message: &str) -> String {
        self.secrets
            .iter()
            .fold(message.to_string(), |text, secret| text.replace(secret.as_str(), "***"))
    }

    /// Append a timestamped line locally and to the stored record
    async fn log(&mut self, message: &str) {
        let line = stamp(&self.scrub(message));
        self.logs.push_str(&line);
        self.persist(DeploymentPatch::log(line)).await;
    }

    async fn persist(&self, patch: DeploymentPatch) {
        if let Err(e) = self.orchestrator.store.update(&self.id, patch).await {
            warn!("[{}] Failed to persist deployment update: {}", self.id, e);
        }
    }

    async fn stored_status(&self) -> Option<DeploymentStatus> {
        match self.orchestrator.store.find_by_id(&self.id).await {
            Ok(record) => record.map(|r| r.status),
            Err(e) => {
                warn!("[{}] Failed to read deployment status: {}", self.id, e);
                None
            }
        }
    }

    async fn check_cancelled(&self) -> Result<(), LaunchError> {
        if self.stored_status().await == Some(DeploymentStatus::Cancelled) {
            return Err(LaunchError::Cancelled);
        }
        Ok(())
    }

    /// Run `command` on the run's session, connecting on first use
    async fn exec(&self, command: &str) -> Result<String, LaunchError> {
        let session = self
            .orchestrator
            .registry
            .get_or_create(&self.session_key, &self.credentials)
            .await?;
        execute(&session, command).await
    }

    async fn begin(&mut self, name: StepName) {
        if let Err(e) = self.board.start(name) {
            warn!("[{}] {}", self.id, e);
        }
        self.log(&format!("Starting {}", name)).await;
        self.persist(DeploymentPatch::steps(self.board.snapshot()))
            .await;
    }

    async fn complete(&mut self, name: StepName, status: StepStatus, details: Option<String>) {
        let line = match (&status, &details) {
            (StepStatus::Success, Some(d)) => format!("{} done: {}", name, d),
            (StepStatus::Success, None) => format!("{} done", name),
            (_, Some(d)) => format!("{} failed: {}", name, d),
            (_, None) => format!("{} failed", name),
        };
        let details = details.map(|d| self.scrub(&d));
        if let Err(e) = self.board.finish(name, status, details) {
            warn!("[{}] {}", self.id, e);
        }
        self.log(&line).await;
        self.persist(DeploymentPatch::steps(self.board.snapshot()))
            .await;
    }

    async fn steps(&mut self) -> Result<(), LaunchError> {
        for name in StepName::ALL {
            self.check_cancelled().await?;
            self.begin(name).await;

            let outcome = match name {
                StepName::SystemSetup => self.system_setup().await,
                StepName::DirectoryBackup => self.directory_backup().await,
                StepName::CloneRepository => self.clone_repository().await,
                StepName::InstallBuild => self.install_build().await,
                StepName::StartApplication => self.start_application().await,
                StepName::ConfigureNginx => self.configure_nginx().await,
                StepName::SslCertificate => self.ssl_certificate().await,
            };

            match outcome {
                Ok(details) => self.complete(name, StepStatus::Success, details).await,
                Err(e) if name.is_fatal() || e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!("[{}] {} failed, continuing: {}", self.id, name, e);
                    self.complete(name, StepStatus::Failure, Some(e.to_string()))
                        .await
                }
            }
        }
        Ok(())
    }

    /// Record the terminal status and close the run's session
    async fn conclude(mut self, result: Result<(), LaunchError>) -> DeployResult {
        let cancelled = matches!(&result, Err(e) if e.is_cancelled())
            || self.stored_status().await == Some(DeploymentStatus::Cancelled);

        let (event, message) = if cancelled {
            self.board.fail_running("Cancelled");
            (DeploymentEvent::Cancelled, CANCELLED_MESSAGE.to_string())
        } else {
            match result {
                Ok(()) => (DeploymentEvent::Succeeded, SUCCESS_MESSAGE.to_string()),
                Err(e) => {
                    let message = self.scrub(&e.to_string());
                    self.board.fail_running(&message);
                    (DeploymentEvent::Failed(message.clone()), message)
                }
            }
        };

        let mut fsm = DeploymentFsm::new();
        if let Err(e) = fsm.process(event) {
            warn!("[{}] {}", self.id, e);
        }
        let status = fsm.state();

        let line = stamp(&format!("{} ({:?})", message, status));
        self.logs.push_str(&line);
        self.persist(DeploymentPatch {
            status: Some(status),
            steps: Some(self.board.snapshot()),
            append_log: Some(line),
        })
        .await;

        self.orchestrator.registry.close(&self.session_key).await;
        info!("[{}] Finished with {:?}: {}", self.id, status, message);

        DeployResult {
            success: status == DeploymentStatus::Success,
            message,
            logs: self.logs,
            steps: self.board.snapshot(),
            deploy_id: self.id,
        }
    }

    async fn system_setup(&mut self) -> Result<Option<String>, LaunchError> {
        let output = self
            .exec(&host::system_setup_command(self.config.framework, self.sudo))
            .await?;
        host::classify_setup_output(&output)?;
        Ok(Some(tail(&output, 1)).filter(|s| !s.is_empty()))
    }

    async fn directory_backup(&mut self) -> Result<Option<String>, LaunchError> {
        let command =
            host::prepare_directory_command(&self.app, &self.username, unix_secs(), self.sudo);
        let output = self.exec(&command).await?;
        host::classify_prepare_output(&output)?;
        match host::reported_backup(&output) {
            Some(backup) => {
                self.log(&format!("Existing project moved to {}", backup)).await;
                Ok(Some(format!("Backed up to {}", backup)))
            }
            None => Ok(Some(format!("Created {}", self.project_dir))),
        }
    }

    async fn clone_repository(&mut self) -> Result<Option<String>, LaunchError> {
        let source = credentials::select(self.config)?;
        self.log(&format!("Cloning with {}", source.describe())).await;

        match source {
            CloneSource::DeployKey {
                token,
                owner,
                repo,
                ssh_url,
            } => {
                self.clone_with_deploy_key(&token, &owner, &repo, &ssh_url)
                    .await?
            }
            CloneSource::Https { url, .. } => {
                if let Ok(parsed) = url::Url::parse(&url) {
                    for part in [parsed.username(), parsed.password().unwrap_or_default()] {
                        if !part.is_empty() {
                            self.secrets.push(part.to_string());
                        }
                    }
                }
                let command =
                    git::https_clone_command(&url, self.config.branch(), &self.project_dir);
                let output = self.exec(&command).await?;
                git::classify_clone_output(&output)?;
            }
        }

        let listing = self.exec(&git::listing_command(&self.work_dir)).await?;
        git::verify_checkout(&listing, self.config.framework, &self.work_dir)?;
        Ok(Some(format!("Cloned branch {}", self.config.branch())))
    }

    /// Clone over SSH with an ephemeral deploy key. The key is revoked and its
    /// files removed before the clone output is classified.
    async fn clone_with_deploy_key(
        &mut self,
        token: &str,
        owner: &str,
        repo: &str,
        ssh_url: &str,
    ) -> Result<(), LaunchError> {
        let mut key_id = None;
        let cloned = self
            .register_key_and_clone(token, owner, repo, ssh_url, &mut key_id)
            .await;
        self.revoke_deploy_key(token, owner, repo, key_id).await;
        git::classify_clone_output(&cloned?)
    }

    async fn register_key_and_clone(
        &mut self,
        token: &str,
        owner: &str,
        repo: &str,
        ssh_url: &str,
        key_id: &mut Option<u64>,
    ) -> Result<String, LaunchError> {
        let output = self.exec(&git::keygen_command(&self.app)).await?;
        let public_key = git::parse_public_key(&output).ok_or_else(|| {
            LaunchError::DeployKeyError("ssh-keygen did not produce a public key".to_string())
        })?;

        let title = format!("launchpad-{}-{}", self.app, unix_secs());
        let outcome = self
            .orchestrator
            .github
            .add_deploy_key(token, owner, repo, &public_key, &title)
            .await?;
        if !outcome.success {
            return Err(LaunchError::DeployKeyError(outcome.message));
        }
        *key_id = outcome.key_id;
        self.log(&format!("Registered deploy key on {}/{}", owner, repo))
            .await;

        self.exec(git::known_hosts_command()).await?;
        let command =
            git::ssh_clone_command(ssh_url, self.config.branch(), &self.project_dir, &self.app);
        self.exec(&command).await
    }

    async fn revoke_deploy_key(&mut self, token: &str, owner: &str, repo: &str, key_id: Option<u64>) {
        if let Some(key_id) = key_id {
            match self
                .orchestrator
                .github
                .delete_deploy_key(token, owner, repo, key_id)
                .await
            {
                Ok(()) => self.log("Deploy key revoked").await,
                Err(e) => {
                    warn!("[{}] Failed to revoke deploy key {}: {}", self.id, key_id, e);
                    self.log(&format!("Failed to revoke deploy key: {}", e)).await;
                }
            }
        }
        if let Err(e) = self.exec(&git::remove_key_command(&self.app)).await {
            warn!("[{}] Failed to remove deploy key files: {}", self.id, e);
        }
    }

    async fn install_build(&mut self) -> Result<Option<String>, LaunchError> {
        if let Some(env_vars) = self.config.env_vars() {
            let output = self
                .exec(&install::env_file_command(&self.work_dir, env_vars))
                .await?;
            host::classify_directory_output(&output)?;
            self.log("Wrote .env").await;
        }

        if let Some(command) = install::install_command(&self.work_dir, self.config.framework) {
            self.log("Installing dependencies").await;
            let output = self.exec(&command).await?;
            install::classify_build_output(&output)?;
        }

        match install::build_command(&self.work_dir, self.config) {
            Some(command) => {
                self.log("Building").await;
                let output = self.exec(&command).await?;
                install::classify_build_output(&output)?;
                Ok(Some("Installed and built".to_string()))
            }
            None => Ok(Some("Installed".to_string())),
        }
    }

    async fn start_application(&mut self) -> Result<Option<String>, LaunchError> {
        let port = self.config.port();
        let command = pm2::start_command(&self.work_dir, &self.app, port, self.config);
        let output = self.exec(&command).await?;
        pm2::classify_output(&output)?;

        if let Err(e) = self
            .exec(&pm2::startup_command(&self.username, self.sudo))
            .await
        {
            warn!("[{}] pm2 startup registration failed: {}", self.id, e);
        }
        Ok(Some(format!("Running as {} on port {}", self.app, port)))
    }

    async fn configure_nginx(&mut self) -> Result<Option<String>, LaunchError> {
        let Some(domain) = self.config.domain() else {
            return Ok(Some("Skipped (No Domain/IP)".to_string()));
        };
        nginx::validate_server_name(domain)?;

        let port = self.config.port();
        let site = nginx::render_site(domain, port);
        let output = self
            .exec(&nginx::install_site_command(&self.app, &site, self.sudo))
            .await?;
        host::classify_directory_output(&output)?;

        let output = self.exec(&nginx::test_config_command(self.sudo)).await?;
        if let Err(e) = nginx::classify_test_output(&output) {
            // An enabled site that fails `nginx -t` would block every later reload.
            if let Err(cleanup) = self
                .exec(&nginx::remove_site_command(&self.app, self.sudo))
                .await
            {
                warn!("[{}] Could not remove rejected nginx site: {}", self.id, cleanup);
            }
            return Err(e);
        }

        self.exec(&nginx::reload_command(self.sudo)).await?;
        Ok(Some(format!("Proxying {} to port {}", domain, port)))
    }

    async fn ssl_certificate(&mut self) -> Result<Option<String>, LaunchError> {
        let Some(domain) = self.config.domain() else {
            return Ok(Some("Skipped (No Domain)".to_string()));
        };
        if certbot::is_ip_address(domain) {
            return Ok(Some("Skipped (IP address)".to_string()));
        }
        if self.board.get(StepName::ConfigureNginx).status != StepStatus::Success {
            return Err(LaunchError::CertificateError(
                "Nginx is not configured for this domain".to_string(),
            ));
        }

        let output = self.exec(&certbot::install_command(self.sudo)).await?;
        host::classify_setup_output(&output)?;

        let email = self.config.ssl_email.as_deref().map(str::trim).filter(|e| !e.is_empty());
        let output = self
            .exec(&certbot::issue_command(domain, email, self.sudo))
            .await?;
        certbot::classify_output(&output)?;
        Ok(Some(format!("HTTPS enabled for {}", domain)))
    }
}
