//! Session registry tests

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

use launchpad::errors::LaunchError;
use launchpad::session::{execute, Connector, SessionRegistry, ShellEvent, WindowSize};

use crate::fakes::{healthy_node_host, server, FakeConnector};

fn registry(connector: FakeConnector) -> (Arc<FakeConnector>, SessionRegistry) {
    let connector = Arc::new(connector);
    let registry = SessionRegistry::new(connector.clone() as Arc<dyn Connector>);
    (connector, registry)
}

#[tokio::test]
async fn test_sessions_are_reused_per_key() {
    let (connector, registry) = registry(healthy_node_host());
    let credentials = server().credentials();

    let first = assert_ok!(registry.get_or_create("deploy_a", &credentials).await);
    let again = assert_ok!(registry.get_or_create("deploy_a", &credentials).await);
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(connector.connects(), 1);

    assert_ok!(registry.get_or_create("deploy_b", &credentials).await);
    assert_eq!(connector.connects(), 2);
    assert_eq!(registry.keys().await, vec!["deploy_a", "deploy_b"]);
}

#[tokio::test]
async fn test_execute_runs_on_session() {
    let (connector, registry) = registry(healthy_node_host());
    let session = assert_ok!(registry.get_or_create("k", &server().credentials()).await);

    let output = assert_ok!(execute(&session, "nginx -t 2>&1").await);
    assert!(output.contains("successful"));
    assert_eq!(connector.commands(), vec!["nginx -t 2>&1"]);
}

#[tokio::test]
async fn test_connect_failure_is_not_stored() {
    let (_, registry) = registry(FakeConnector::new().refusing());

    let err = assert_err!(registry.get_or_create("k", &server().credentials()).await);
    assert!(matches!(err, LaunchError::ConnectionError(_)));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn test_close_matching_by_substring() {
    let (connector, registry) = registry(healthy_node_host());
    let credentials = server().credentials();
    for key in ["deploy_abc", "teardown_abc", "deploy_xyz", "deploy@203.0.113.7"] {
        assert_ok!(registry.get_or_create(key, &credentials).await);
    }

    assert_eq!(registry.close_matching("abc").await, 2);
    assert_eq!(registry.keys().await, vec!["deploy@203.0.113.7", "deploy_xyz"]);
    assert_eq!(connector.open_transports(), 2);

    assert_eq!(registry.close_matching("abc").await, 0);
    assert!(registry.close("deploy_xyz").await);
    assert!(!registry.close("deploy_xyz").await);
    assert_eq!(registry.close_all().await, 1);
    assert!(registry.is_empty().await);
    assert_eq!(connector.open_transports(), 0);
}

#[tokio::test]
async fn test_closed_session_rejects_commands() {
    let (_, registry) = registry(healthy_node_host());
    let session = assert_ok!(registry.get_or_create("k", &server().credentials()).await);

    registry.close("k").await;
    assert_err!(execute(&session, "uptime").await);
}

#[tokio::test]
async fn test_interactive_shell() {
    let (_, registry) = registry(healthy_node_host());
    let credentials = server().credentials();
    let key = credentials.terminal_key();
    let (events_tx, mut events) = mpsc::unbounded_channel();

    assert_ok!(
        registry
            .open_shell(&key, &credentials, WindowSize::default(), events_tx)
            .await
    );
    assert_ok!(registry.write_shell(&key, b"ls\n").await);
    assert_ok!(
        registry
            .resize_shell(&key, WindowSize { cols: 120, rows: 40 })
            .await
    );

    let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap();
    assert_eq!(event, Some(ShellEvent::Output(b"ls\n".to_vec())));

    assert_ok!(registry.close_shell(&key).await);
    let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap();
    assert_eq!(event, Some(ShellEvent::Closed));

    // The connection itself stays open
    assert_eq!(registry.len().await, 1);
    let err = assert_err!(registry.write_shell(&key, b"x").await);
    assert!(matches!(err, LaunchError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_shell_ops_on_unknown_key() {
    let (_, registry) = registry(healthy_node_host());

    let err = assert_err!(registry.write_shell("nobody@nowhere", b"x").await);
    assert!(matches!(err, LaunchError::SessionNotFound(_)));
    assert_err!(registry.close_shell("nobody@nowhere").await);
}
