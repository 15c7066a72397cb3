//! HTTP handler tests

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use launchpad::app::state::AppState;
use launchpad::http::github::GitHubApi;
use launchpad::models::deployment::{DeployConfig, DeploymentStatus};
use launchpad::models::server::ServerRecord;
use launchpad::server::handlers::{
    create_deployment_handler, get_deployment_handler, list_branches_handler,
    list_deployments_handler, restart_app_handler, save_server_handler, DeployRequest,
    TargetQuery,
};
use launchpad::session::Connector;
use launchpad::storage::{MemoryStore, Store};

use crate::fakes::{healthy_node_host, server, FakeGitHub};

fn state() -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(healthy_node_host()) as Arc<dyn Connector>,
        Arc::new(MemoryStore::new()) as Arc<dyn Store>,
        Arc::new(FakeGitHub::default()) as Arc<dyn GitHubApi>,
    ))
}

fn target(lines: Option<u32>) -> TargetQuery {
    TargetQuery {
        host: "203.0.113.7".to_string(),
        user: "deploy".to_string(),
        lines,
    }
}

#[tokio::test]
async fn test_save_server_defaults_port_and_hides_password() {
    let state = state();
    let request = ServerRecord {
        port: 0,
        ..server()
    };

    let (status, Json(summary)) = save_server_handler(State(state.clone()), Json(request))
        .await
        .map_err(|e| e.into_response().status())
        .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(summary.port, 22);
    let body = serde_json::to_string(&summary).unwrap();
    assert!(!body.contains("s3cret-pass"));
}

#[tokio::test]
async fn test_save_server_requires_host() {
    let request = ServerRecord {
        host: " ".to_string(),
        ..server()
    };

    let err = save_server_handler(State(state()), Json(request))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_deployment_runs_in_background() {
    let state = state();
    let request = DeployRequest {
        server: server(),
        config: DeployConfig {
            app_name: "demo".to_string(),
            repo_url: "https://github.com/acme/demo".to_string(),
            ..Default::default()
        },
    };

    let (status, Json(accepted)) = create_deployment_handler(State(state.clone()), Json(request))
        .await
        .map_err(|e| e.into_response().status())
        .unwrap();
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut record = None;
    for _ in 0..100 {
        let Json(current) = get_deployment_handler(State(state.clone()), Path(accepted.deploy_id.clone()))
            .await
            .map_err(|e| e.into_response().status())
            .unwrap();
        if current.status.is_terminal() {
            record = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let record = record.expect("deployment did not finish");
    assert_eq!(record.status, DeploymentStatus::Success);

    let Json(listed) = list_deployments_handler(State(state.clone()), Query(target(None)))
        .await
        .map_err(|e| e.into_response().status())
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, accepted.deploy_id);

    // The server was stored with the request
    assert!(state
        .store
        .find_server("203.0.113.7", "deploy")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_invalid_deployment_is_rejected() {
    let request = DeployRequest {
        server: server(),
        config: DeployConfig {
            app_name: "***".to_string(),
            repo_url: "https://github.com/acme/demo".to_string(),
            ..Default::default()
        },
    };

    let err = create_deployment_handler(State(state()), Json(request))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_deployment_is_not_found() {
    let err = get_deployment_handler(State(state()), Path("nope".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_app_routes_need_a_stored_server() {
    let state = state();
    let err = restart_app_handler(
        State(state.clone()),
        Path("demo".to_string()),
        Query(target(None)),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

    state.store.save_server(server()).await.unwrap();
    let result = restart_app_handler(State(state), Path("demo".to_string()), Query(target(None))).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_branches_require_bearer_token() {
    let state = state();
    let path = Path(("acme".to_string(), "demo".to_string()));

    let err = list_branches_handler(State(state.clone()), path, HeaderMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer gho_token"));
    let Json(branches) = list_branches_handler(
        State(state),
        Path(("acme".to_string(), "demo".to_string())),
        headers,
    )
    .await
    .unwrap();
    assert_eq!(branches[0].name, "main");
}
