//! Store tests for the in-memory and JSON file backends

use chrono::{Duration, Utc};
use tokio_test::{assert_err, assert_ok};

use launchpad::deploy::steps::StepBoard;
use launchpad::errors::LaunchError;
use launchpad::filesys::dir::Dir;
use launchpad::models::deployment::{
    DeploymentPatch, DeploymentRecord, DeploymentStatus, Framework, StepName, StepStatus,
};
use launchpad::storage::layout::StorageLayout;
use launchpad::storage::{JsonFileStore, MemoryStore, Store};

use crate::fakes::server;

fn record(id: &str, minutes_ago: i64) -> DeploymentRecord {
    let at = Utc::now() - Duration::minutes(minutes_ago);
    DeploymentRecord {
        id: id.to_string(),
        server_host: "203.0.113.7".to_string(),
        server_user: "deploy".to_string(),
        app_name: "demo".to_string(),
        repo_url: "https://github.com/acme/demo".to_string(),
        branch: "main".to_string(),
        port: 3000,
        framework: Framework::Node,
        domain: None,
        status: DeploymentStatus::Running,
        steps: StepBoard::new().snapshot(),
        logs: String::new(),
        created_at: at,
        updated_at: at,
    }
}

async fn check_cancelled_is_sticky(store: &dyn Store) {
    assert_ok!(store.create(record("d-1", 0)).await);

    let updated = assert_ok!(
        store
            .update("d-1", DeploymentPatch::status(DeploymentStatus::Cancelled).with_log("stop\n"))
            .await
    );
    assert_eq!(updated.status, DeploymentStatus::Cancelled);

    let updated = assert_ok!(
        store
            .update("d-1", DeploymentPatch::status(DeploymentStatus::Failed).with_log("late\n"))
            .await
    );
    assert_eq!(updated.status, DeploymentStatus::Cancelled);
    assert_eq!(updated.logs, "stop\nlate\n");
}

async fn check_steps_and_listing(store: &dyn Store) {
    assert_ok!(store.create(record("old", 10)).await);
    assert_ok!(store.create(record("new", 1)).await);
    let mut other = record("elsewhere", 0);
    other.server_host = "198.51.100.1".to_string();
    assert_ok!(store.create(other).await);

    let mut board = StepBoard::new();
    assert_ok!(board.start(StepName::SystemSetup));
    assert_ok!(store.update("new", DeploymentPatch::steps(board.snapshot())).await);

    let found = assert_ok!(store.find_by_host_and_user("203.0.113.7", "deploy").await);
    let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "old"]);
    assert_eq!(found[0].steps[0].status, StepStatus::Running);

    let err = assert_err!(store.update("missing", DeploymentPatch::log("x")).await);
    assert!(matches!(err, LaunchError::NotFound(_)));
    assert!(assert_ok!(store.find_by_id("missing").await).is_none());
}

async fn check_server_upsert(store: &dyn Store) {
    let first = assert_ok!(store.save_server(server()).await);
    assert!(!first.id.is_empty());

    let mut changed = server();
    changed.password = "rotated".to_string();
    let second = assert_ok!(store.save_server(changed).await);
    assert_eq!(second.id, first.id);

    let found = assert_ok!(store.find_server("203.0.113.7", "deploy").await).unwrap();
    assert_eq!(found.password, "rotated");
    assert!(assert_ok!(store.find_server("203.0.113.7", "root").await).is_none());
}

#[tokio::test]
async fn test_memory_store() {
    check_cancelled_is_sticky(&MemoryStore::new()).await;
    check_steps_and_listing(&MemoryStore::new()).await;
    check_server_upsert(&MemoryStore::new()).await;
}

async fn file_store(dir: &Dir, name: &str) -> JsonFileStore {
    let layout = StorageLayout::new(dir.subdir(name).path());
    assert_ok!(layout.setup().await);
    JsonFileStore::new(layout)
}

#[tokio::test]
async fn test_json_file_store() {
    let dir = assert_ok!(Dir::create_temp_dir("launchpad-store").await);

    check_cancelled_is_sticky(&file_store(&dir, "a").await).await;
    check_steps_and_listing(&file_store(&dir, "b").await).await;
    check_server_upsert(&file_store(&dir, "c").await).await;

    assert_ok!(dir.delete().await);
}

#[tokio::test]
async fn test_json_file_store_survives_reopen() {
    let dir = assert_ok!(Dir::create_temp_dir("launchpad-reopen").await);

    let store = file_store(&dir, "s").await;
    assert_ok!(store.create(record("d-1", 0)).await);
    assert_ok!(store.update("d-1", DeploymentPatch::log("hello\n")).await);
    drop(store);

    let reopened = file_store(&dir, "s").await;
    let record = assert_ok!(reopened.find_by_id("d-1").await).unwrap();
    assert_eq!(record.logs, "hello\n");

    assert_ok!(dir.delete().await);
}

#[tokio::test]
async fn test_json_file_store_rejects_path_ids() {
    let dir = assert_ok!(Dir::create_temp_dir("launchpad-ids").await);
    let store = file_store(&dir, "s").await;

    let err = assert_err!(store.create(record("../escape", 0)).await);
    assert!(matches!(err, LaunchError::ValidationError(_)));
    assert_err!(store.find_by_id("a/b").await);

    assert_ok!(dir.delete().await);
}
