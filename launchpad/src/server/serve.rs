//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::app::state::AppState;
use crate::errors::LaunchError;
use crate::server::handlers::{
    create_deployment_handler, delete_app_handler, get_deployment_handler, health_handler,
    list_branches_handler, list_deployments_handler, app_logs_handler, restart_app_handler,
    save_server_handler, stop_deployment_handler, version_handler,
};

/// All routes over `state`
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Servers
        .route("/servers", post(save_server_handler))
        // Deployments
        .route(
            "/deployments",
            get(list_deployments_handler).post(create_deployment_handler),
        )
        .route("/deployments/{id}", get(get_deployment_handler))
        .route("/deployments/{id}/stop", post(stop_deployment_handler))
        // Deployed apps
        .route("/apps/{name}", delete(delete_app_handler))
        .route("/apps/{name}/restart", post(restart_app_handler))
        .route("/apps/{name}/logs", get(app_logs_handler))
        // GitHub
        .route("/repos/{owner}/{repo}/branches", get(list_branches_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve in a background task
pub async fn serve(
    options: &ServerOptions,
    state: Arc<AppState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), LaunchError>>, LaunchError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LaunchError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| LaunchError::ServerError(e.to_string()))
    });

    Ok(handle)
}
