//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::app::state::AppState;
use crate::errors::LaunchError;
use crate::http::github::Branch;
use crate::models::deployment::{DeployConfig, DeploymentRecord};
use crate::models::server::{ServerRecord, ServerSummary};
use crate::utils::version_info;

/// Error body returned by every handler
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// [`LaunchError`] as an HTTP response
pub struct ApiError(pub LaunchError);

impl From<LaunchError> for ApiError {
    fn from(err: LaunchError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LaunchError::ValidationError(_) | LaunchError::JsonError(_) => StatusCode::BAD_REQUEST,
            LaunchError::NotFound(_) | LaunchError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            LaunchError::ConnectionError(_) | LaunchError::GitHubError(_) | LaunchError::HttpError(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub sessions: usize,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "launchpad".to_string(),
        version: version_info().version,
        sessions: state.registry.len().await,
    })
}

pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Register (or update) a target server
pub async fn save_server_handler(
    State(state): State<Arc<AppState>>,
    Json(server): Json<ServerRecord>,
) -> Result<(StatusCode, Json<ServerSummary>), ApiError> {
    let server = with_default_port(&state, validate_server(server)?);
    let saved = state.store.save_server(server).await?;
    Ok((StatusCode::CREATED, Json(saved.summary())))
}

/// Deployment request: where and what
#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    pub server: ServerRecord,
    pub config: DeployConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployAccepted {
    pub deploy_id: String,
}

/// Create the record, start the run in the background and return its ID
pub async fn create_deployment_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeployRequest>,
) -> Result<(StatusCode, Json<DeployAccepted>), ApiError> {
    let server = with_default_port(&state, validate_server(request.server)?);
    let server = match state.store.save_server(server.clone()).await {
        Ok(saved) => saved,
        Err(e) => {
            warn!("Failed to store server {}: {}", server.host, e);
            server
        }
    };

    let record = state
        .orchestrator
        .create_deployment(&server, &request.config)
        .await?;

    let orchestrator = state.orchestrator.clone();
    let deploy_id = record.id.clone();
    let config = request.config;
    tokio::spawn(async move {
        orchestrator.run(&deploy_id, &server, &config).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(DeployAccepted {
            deploy_id: record.id,
        }),
    ))
}

pub async fn get_deployment_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeploymentRecord>, ApiError> {
    state
        .store
        .find_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError(LaunchError::NotFound(format!("deployment {}", id))))
}

/// Target server selection for app and listing routes
#[derive(Debug, Deserialize)]
pub struct TargetQuery {
    pub host: String,
    pub user: String,
    #[serde(default)]
    pub lines: Option<u32>,
}

pub async fn list_deployments_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<Vec<DeploymentRecord>>, ApiError> {
    let deployments = state
        .store
        .find_by_host_and_user(&query.host, &query.user)
        .await?;
    Ok(Json(deployments))
}

pub async fn stop_deployment_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeploymentRecord>, ApiError> {
    let record = state.orchestrator.stop(&id).await?;
    Ok(Json(record))
}

#[derive(Debug, Serialize)]
pub struct TeardownResponse {
    pub success: bool,
    pub warnings: Vec<String>,
}

pub async fn delete_app_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<TeardownResponse>, ApiError> {
    let server = stored_server(&state, &query).await?;
    let warnings = state.orchestrator.delete_app(&server, &name).await?;
    Ok(Json(TeardownResponse {
        success: true,
        warnings,
    }))
}

#[derive(Debug, Serialize)]
pub struct OutputResponse {
    pub output: String,
}

pub async fn restart_app_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<OutputResponse>, ApiError> {
    let server = stored_server(&state, &query).await?;
    let output = state.orchestrator.restart_app(&server, &name).await?;
    Ok(Json(OutputResponse { output }))
}

pub async fn app_logs_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<TargetQuery>,
) -> Result<Json<OutputResponse>, ApiError> {
    let server = stored_server(&state, &query).await?;
    let lines = query.lines.unwrap_or(100).clamp(1, 5000);
    let output = state.orchestrator.app_logs(&server, &name, lines).await?;
    Ok(Json(OutputResponse { output }))
}

/// Branches of a GitHub repository, using the caller's bearer token
pub async fn list_branches_handler(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Vec<Branch>>, Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing bearer token".to_string(),
                }),
            )
                .into_response()
        })?;

    state
        .github
        .list_branches(token, &owner, &repo)
        .await
        .map(Json)
        .map_err(|e| ApiError(e).into_response())
}

fn validate_server(server: ServerRecord) -> Result<ServerRecord, LaunchError> {
    if server.host.trim().is_empty() || server.username.trim().is_empty() {
        return Err(LaunchError::ValidationError(
            "host and username are required".to_string(),
        ));
    }
    Ok(server)
}

fn with_default_port(state: &AppState, mut server: ServerRecord) -> ServerRecord {
    if server.port == 0 {
        server.port = state.default_ssh_port;
    }
    server
}

async fn stored_server(state: &AppState, query: &TargetQuery) -> Result<ServerRecord, ApiError> {
    state
        .store
        .find_server(&query.host, &query.user)
        .await?
        .ok_or_else(|| {
            ApiError(LaunchError::NotFound(format!(
                "server {}@{}",
                query.user, query.host
            )))
        })
}
