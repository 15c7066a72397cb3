//! Repository access strategy

use tracing::warn;
use url::Url;

use crate::errors::LaunchError;
use crate::http::github::parse_github_repo;
use crate::models::deployment::{AuthType, DeployConfig};

/// How the repository will be cloned
#[derive(Clone, PartialEq, Eq)]
pub enum CloneSource {
    /// Ephemeral deploy key registered through the GitHub API, SSH clone
    DeployKey {
        token: String,
        owner: String,
        repo: String,
        ssh_url: String,
    },

    /// HTTPS clone; `url` may carry credentials
    Https { url: String, auth: HttpsAuth },
}

/// Credentials embedded in an HTTPS clone URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpsAuth {
    Token,
    UsernamePassword,
    Anonymous,
}

impl CloneSource {
    /// Log-safe description
    pub fn describe(&self) -> String {
        match self {
            CloneSource::DeployKey { owner, repo, .. } => {
                format!("deploy key for {}/{}", owner, repo)
            }
            CloneSource::Https { auth, .. } => match auth {
                HttpsAuth::Token => "HTTPS with access token".to_string(),
                HttpsAuth::UsernamePassword => "HTTPS with username/password".to_string(),
                HttpsAuth::Anonymous => "anonymous HTTPS".to_string(),
            },
        }
    }
}

impl std::fmt::Debug for CloneSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Pick exactly one access mechanism for `config`.
///
/// OAuth with a token uses a deploy key. Otherwise a token wins over a
/// username/password pair, and with neither the URL is used as given.
pub fn select(config: &DeployConfig) -> Result<CloneSource, LaunchError> {
    if config.auth_type == AuthType::Oauth {
        if let Some(token) = config.token() {
            match parse_github_repo(&config.repo_url) {
                Some((owner, repo)) => {
                    return Ok(CloneSource::DeployKey {
                        token: token.to_string(),
                        ssh_url: format!("git@github.com:{}/{}.git", owner, repo),
                        owner,
                        repo,
                    });
                }
                None => warn!(
                    "OAuth deployment of a non-GitHub repository, falling back to token URL"
                ),
            }
        }
    }

    if let Some(token) = config.token() {
        let url = embed_credentials(&config.repo_url, token, None)?;
        return Ok(CloneSource::Https {
            url,
            auth: HttpsAuth::Token,
        });
    }

    if let Some((username, password)) = config.basic_auth() {
        let url = embed_credentials(&config.repo_url, username, Some(password))?;
        return Ok(CloneSource::Https {
            url,
            auth: HttpsAuth::UsernamePassword,
        });
    }

    Ok(CloneSource::Https {
        url: https_url(&config.repo_url)?.to_string(),
        auth: HttpsAuth::Anonymous,
    })
}

/// Put `user[:password]` into the URL's userinfo, percent-encoded
pub fn embed_credentials(
    repo_url: &str,
    user: &str,
    password: Option<&str>,
) -> Result<String, LaunchError> {
    let mut url = https_url(repo_url)?;
    url.set_username(user)
        .map_err(|_| LaunchError::ValidationError("Repository URL cannot carry credentials".into()))?;
    url.set_password(password)
        .map_err(|_| LaunchError::ValidationError("Repository URL cannot carry credentials".into()))?;
    Ok(url.to_string())
}

fn https_url(repo_url: &str) -> Result<Url, LaunchError> {
    let trimmed = repo_url.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&candidate)
        .map_err(|e| LaunchError::ValidationError(format!("Invalid repository URL: {}", e)))?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        scheme => Err(LaunchError::ValidationError(format!(
            "Unsupported repository URL scheme: {}",
            scheme
        ))),
    }
}
