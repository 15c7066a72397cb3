//! GitHub REST API: deploy keys and branches

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::LaunchError;
use crate::http::client::HttpClient;

/// Result of registering a deploy key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployKeyOutcome {
    pub success: bool,
    pub message: String,
    pub key_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(default)]
    pub protected: bool,
}

/// GitHub operations needed for deployments
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Register a read-only deploy key. API rejections are reported through
    /// `success: false`, transport failures as errors.
    async fn add_deploy_key(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        public_key: &str,
        title: &str,
    ) -> Result<DeployKeyOutcome, LaunchError>;

    async fn delete_deploy_key(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        key_id: u64,
    ) -> Result<(), LaunchError>;

    async fn list_branches(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Branch>, LaunchError>;
}

/// [`GitHubApi`] over the REST API
pub struct GitHubClient {
    http: HttpClient,
}

impl GitHubClient {
    pub fn new(api_base_url: &str) -> Result<Self, LaunchError> {
        Ok(Self {
            http: HttpClient::new(api_base_url)?,
        })
    }
}

#[derive(Serialize)]
struct NewDeployKey<'a> {
    title: &'a str,
    key: &'a str,
    read_only: bool,
}

#[derive(Deserialize)]
struct DeployKey {
    id: u64,
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn add_deploy_key(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        public_key: &str,
        title: &str,
    ) -> Result<DeployKeyOutcome, LaunchError> {
        let body = NewDeployKey {
            title,
            key: public_key,
            read_only: true,
        };
        let path = format!("/repos/{}/{}/keys", owner, repo);
        match self.http.post::<DeployKey, _>(&path, token, &body).await {
            Ok(key) => {
                info!("Registered deploy key {} on {}/{}", key.id, owner, repo);
                Ok(DeployKeyOutcome {
                    success: true,
                    message: "Deploy key added".to_string(),
                    key_id: Some(key.id),
                })
            }
            Err(LaunchError::GitHubError(message)) => {
                warn!("GitHub rejected deploy key for {}/{}: {}", owner, repo, message);
                Ok(DeployKeyOutcome {
                    success: false,
                    message,
                    key_id: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_deploy_key(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        key_id: u64,
    ) -> Result<(), LaunchError> {
        let path = format!("/repos/{}/{}/keys/{}", owner, repo, key_id);
        self.http.delete(&path, token).await?;
        info!("Revoked deploy key {} on {}/{}", key_id, owner, repo);
        Ok(())
    }

    async fn list_branches(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Branch>, LaunchError> {
        let path = format!("/repos/{}/{}/branches?per_page=100", owner, repo);
        self.http.get(&path, token).await
    }
}

/// Owner and repository name of a GitHub URL, HTTPS or SCP-style SSH
pub fn parse_github_repo(repo_url: &str) -> Option<(String, String)> {
    let trimmed = repo_url.trim();
    let path = if let Some(rest) = trimmed.strip_prefix("git@github.com:") {
        rest.to_string()
    } else {
        let url = url::Url::parse(trimmed)
            .or_else(|_| url::Url::parse(&format!("https://{}", trimmed)))
            .ok()?;
        match url.host_str() {
            Some("github.com") | Some("www.github.com") => {}
            _ => return None,
        }
        url.path().to_string()
    };

    let mut parts = path.trim_matches('/').split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}
