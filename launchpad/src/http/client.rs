//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::LaunchError;

const USER_AGENT: &str = concat!("launchpad/", env!("CARGO_PKG_VERSION"));

/// Bearer-authenticated JSON client for a REST API
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Result<Self, LaunchError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, LaunchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = send(self.client.get(&url), token, "GET").await?;
        Ok(response.json().await?)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, LaunchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = send(self.client.post(&url).json(body), token, "POST").await?;
        Ok(response.json().await?)
    }

    /// DELETE, ignoring any response body
    pub async fn delete(&self, path: &str, token: &str) -> Result<(), LaunchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("DELETE {}", url);
        send(self.client.delete(&url), token, "DELETE").await?;
        Ok(())
    }
}

async fn send(request: RequestBuilder, token: &str, method: &str) -> Result<Response, LaunchError> {
    let response = request
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("HTTP {} failed: {} - {}", method, status, body);
        return Err(LaunchError::GitHubError(format!("{}: {}", status, api_message(&body))));
    }
    Ok(response)
}

/// The `message` field of a GitHub error body, else the raw body
pub fn api_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
