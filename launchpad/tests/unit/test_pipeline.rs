//! Deployment pipeline tests against fake hosts

use std::sync::Arc;

use tokio_test::assert_err;

use launchpad::deploy::pipeline::Orchestrator;
use launchpad::errors::LaunchError;
use launchpad::http::github::GitHubApi;
use launchpad::models::deployment::{
    AuthType, DeployConfig, DeploymentStatus, Framework, StepName, StepStatus,
};
use launchpad::session::{Connector, SessionRegistry};
use launchpad::storage::{MemoryStore, Store};

use crate::fakes::{healthy_node_host, server, FakeConnector, FakeGitHub};

struct Harness {
    orchestrator: Orchestrator,
    connector: Arc<FakeConnector>,
    github: Arc<FakeGitHub>,
    store: Arc<MemoryStore>,
    registry: Arc<SessionRegistry>,
}

fn harness(connector: FakeConnector, github: FakeGitHub) -> Harness {
    let connector = Arc::new(connector);
    let github = Arc::new(github);
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(SessionRegistry::new(connector.clone() as Arc<dyn Connector>));
    let orchestrator = Orchestrator::new(
        registry.clone(),
        store.clone() as Arc<dyn Store>,
        github.clone() as Arc<dyn GitHubApi>,
    );
    Harness {
        orchestrator,
        connector,
        github,
        store,
        registry,
    }
}

fn node_config() -> DeployConfig {
    DeployConfig {
        app_name: "demo".to_string(),
        repo_url: "https://github.com/acme/demo".to_string(),
        framework: Framework::Node,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_clean_deploy_without_domain() {
    let h = harness(healthy_node_host(), FakeGitHub::default());
    let config = DeployConfig {
        app_name: "Demo App".to_string(),
        ..node_config()
    };

    let result = h.orchestrator.deploy(&server(), &config).await.unwrap();

    assert!(result.success, "logs: {}", result.logs);
    assert_eq!(result.message, "Deployment successful");
    assert_eq!(result.steps.len(), 7);
    for step in &result.steps[..5] {
        assert_eq!(step.status, StepStatus::Success, "{:?}", step);
    }
    assert_eq!(result.steps[5].status, StepStatus::Success);
    assert_eq!(result.steps[5].details.as_deref(), Some("Skipped (No Domain/IP)"));
    assert_eq!(result.steps[6].details.as_deref(), Some("Skipped (No Domain)"));

    let record = h.store.find_by_id(&result.deploy_id).await.unwrap().unwrap();
    assert_eq!(record.status, DeploymentStatus::Success);
    assert_eq!(record.app_name, "demo-app");
    assert_eq!(record.steps, result.steps);
    assert!(record.logs.contains("Deployment successful"));

    let commands = h.connector.commands();
    assert!(commands
        .iter()
        .any(|c| c.contains("pm2 start 'dist/index.js' --name demo-app")));
    assert!(commands.iter().all(|c| !c.contains("certbot")));
    assert!(!result.logs.contains("s3cret-pass"));

    // The run's session is closed when it ends
    assert!(h.registry.is_empty().await);
    assert_eq!(h.connector.open_transports(), 0);
}

#[tokio::test]
async fn test_clone_auth_failure_fails_deployment() {
    let connector = healthy_node_host().respond(
        "git clone",
        "Cloning into '/var/www/demo'...\nfatal: Authentication failed for 'https://github.com/acme/demo/'\n",
    );
    let h = harness(connector, FakeGitHub::default());

    let result = h.orchestrator.deploy(&server(), &node_config()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.message, "Git Authentication failed.");
    let clone = &result.steps[StepName::CloneRepository.index()];
    assert_eq!(clone.status, StepStatus::Failure);
    assert_eq!(clone.details.as_deref(), Some("Git Authentication failed."));
    for step in &result.steps[3..] {
        assert_eq!(step.status, StepStatus::Pending);
    }
    assert!(h
        .connector
        .commands_containing("cd /var/www/demo && npm install")
        .is_empty());

    let record = h.store.find_by_id(&result.deploy_id).await.unwrap().unwrap();
    assert_eq!(record.status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_nginx_failure_is_not_fatal() {
    let connector = healthy_node_host().respond(
        "nginx -t",
        "nginx: [emerg] unknown directive \"proxy_pas\" in /etc/nginx/sites-enabled/demo:6\nnginx: configuration file /etc/nginx/nginx.conf test failed\n",
    );
    let h = harness(connector, FakeGitHub::default());
    let config = DeployConfig {
        domain: Some("example.com".to_string()),
        ..node_config()
    };

    let result = h.orchestrator.deploy(&server(), &config).await.unwrap();

    assert!(result.success);
    let nginx = &result.steps[StepName::ConfigureNginx.index()];
    assert_eq!(nginx.status, StepStatus::Failure);
    assert!(nginx.details.as_deref().unwrap().contains("unknown directive"));
    assert_eq!(
        result.steps[StepName::SslCertificate.index()].status,
        StepStatus::Failure
    );
    assert!(h.connector.commands_containing("reload nginx").is_empty());
    assert!(h.connector.commands_containing("certbot --nginx").is_empty());
    let removed = h
        .connector
        .commands_containing("rm -f /etc/nginx/sites-enabled/demo");
    assert_eq!(removed.len(), 1);
    assert!(removed[0].contains("/etc/nginx/sites-available/demo"));
}

#[tokio::test]
async fn test_domain_gets_proxy_and_certificate() {
    let h = harness(healthy_node_host(), FakeGitHub::default());
    let config = DeployConfig {
        domain: Some("example.com".to_string()),
        ssl_email: Some("ops@example.com".to_string()),
        port: Some("4000".to_string()),
        ..node_config()
    };

    let result = h.orchestrator.deploy(&server(), &config).await.unwrap();

    assert!(result.success);
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Success));
    let site = h.connector.commands_containing("sites-available/demo");
    assert!(site.iter().any(|c| c.contains("proxy_pass http://localhost:4000;")));
    let certbot = h.connector.commands_containing("certbot --nginx");
    assert_eq!(certbot.len(), 1);
    assert!(certbot[0].contains("-d example.com"));
    assert!(certbot[0].contains("-m 'ops@example.com'"));
}

#[tokio::test]
async fn test_ip_address_skips_certificate() {
    let h = harness(healthy_node_host(), FakeGitHub::default());
    let config = DeployConfig {
        domain: Some("203.0.113.7".to_string()),
        ..node_config()
    };

    let result = h.orchestrator.deploy(&server(), &config).await.unwrap();

    assert!(result.success);
    assert_eq!(
        result.steps[StepName::ConfigureNginx.index()].status,
        StepStatus::Success
    );
    assert_eq!(
        result.steps[StepName::SslCertificate.index()].details.as_deref(),
        Some("Skipped (IP address)")
    );
}

#[tokio::test]
async fn test_existing_project_is_moved_aside() {
    let connector = healthy_node_host().respond(
        "mkdir -p /var/www",
        "LAUNCHPAD_BACKUP /var/www/demo_backup_1700000000\n0\nLAUNCHPAD_DIR_READY\n",
    );
    let h = harness(connector, FakeGitHub::default());

    let result = h.orchestrator.deploy(&server(), &node_config()).await.unwrap();

    assert!(result.success);
    assert_eq!(
        result.steps[StepName::DirectoryBackup.index()].details.as_deref(),
        Some("Backed up to /var/www/demo_backup_1700000000")
    );
    let prepare = h.connector.commands_containing("mkdir -p /var/www");
    assert!(prepare[0].contains("mv /var/www/demo /var/www/demo_backup_"));
    assert!(h.connector.commands_containing("rm -rf").is_empty());
    assert!(result.logs.contains("Existing project moved to /var/www/demo_backup_1700000000"));
}

#[tokio::test]
async fn test_directory_chain_cut_short_fails_deployment() {
    let connector = healthy_node_host().respond(
        "mkdir -p /var/www",
        "chown: changing ownership of '/var/www': Operation not permitted\n",
    );
    let h = harness(connector, FakeGitHub::default());

    let result = h.orchestrator.deploy(&server(), &node_config()).await.unwrap();

    assert!(!result.success);
    let backup = &result.steps[StepName::DirectoryBackup.index()];
    assert_eq!(backup.status, StepStatus::Failure);
    assert!(backup
        .details
        .as_deref()
        .unwrap()
        .contains("changing ownership of '/var/www'"));
    for step in &result.steps[StepName::CloneRepository.index()..] {
        assert_eq!(step.status, StepStatus::Pending);
    }
    assert!(h.connector.commands_containing("git clone").is_empty());

    let record = h.store.find_by_id(&result.deploy_id).await.unwrap().unwrap();
    assert_eq!(record.status, DeploymentStatus::Failed);
}

#[tokio::test]
async fn test_token_is_used_but_never_logged() {
    let h = harness(healthy_node_host(), FakeGitHub::default());
    let config = DeployConfig {
        token: Some("ghp_supersecret".to_string()),
        git_username: Some("alice".to_string()),
        git_password: Some("pw".to_string()),
        ..node_config()
    };

    let result = h.orchestrator.deploy(&server(), &config).await.unwrap();

    assert!(result.success);
    let clone = h.connector.commands_containing("git clone");
    assert!(clone[0].contains("https://ghp_supersecret@github.com/acme/demo"));
    assert!(!result.logs.contains("ghp_supersecret"));
    let record = h.store.find_by_id(&result.deploy_id).await.unwrap().unwrap();
    assert!(!record.logs.contains("ghp_supersecret"));
}

#[tokio::test]
async fn test_oauth_deploy_key_is_revoked_after_clone() {
    let h = harness(healthy_node_host(), FakeGitHub::default());
    let config = DeployConfig {
        auth_type: AuthType::Oauth,
        token: Some("gho_token".to_string()),
        ..node_config()
    };

    let result = h.orchestrator.deploy(&server(), &config).await.unwrap();

    assert!(result.success, "logs: {}", result.logs);
    assert_eq!(h.github.added_count(), 1);
    assert_eq!(h.github.deleted_keys(), vec![4242]);
    let clone = h.connector.commands_containing("git clone");
    assert!(clone[0].starts_with("GIT_SSH_COMMAND="));
    assert!(clone[0].contains("'git@github.com:acme/demo.git'"));
    assert_eq!(
        h.connector
            .commands_containing("rm -f $HOME/.ssh/deploy_key_demo $HOME/.ssh/deploy_key_demo.pub")
            .len(),
        2
    );
    assert!(!result.logs.contains("gho_token"));
}

#[tokio::test]
async fn test_oauth_deploy_key_is_revoked_when_clone_fails() {
    let connector = healthy_node_host().respond(
        "git clone",
        "fatal: Could not read from remote repository.\n",
    );
    let h = harness(connector, FakeGitHub::default());
    let config = DeployConfig {
        auth_type: AuthType::Oauth,
        token: Some("gho_token".to_string()),
        ..node_config()
    };

    let result = h.orchestrator.deploy(&server(), &config).await.unwrap();

    assert!(!result.success);
    assert!(result.message.starts_with("Git clone failed"));
    assert_eq!(h.github.deleted_keys(), vec![4242]);
    let commands = h.connector.commands();
    let clone_at = commands.iter().position(|c| c.contains("git clone")).unwrap();
    let cleanup_at = commands
        .iter()
        .rposition(|c| c.starts_with("rm -f $HOME/.ssh/deploy_key_demo"))
        .unwrap();
    assert!(cleanup_at > clone_at);
}

#[tokio::test]
async fn test_rejected_deploy_key_fails_clone() {
    let h = harness(healthy_node_host(), FakeGitHub::rejecting());
    let config = DeployConfig {
        auth_type: AuthType::Oauth,
        token: Some("gho_token".to_string()),
        ..node_config()
    };

    let result = h.orchestrator.deploy(&server(), &config).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.message, "Deploy key error: key is already in use");
    assert!(h.github.deleted_keys().is_empty());
    assert!(h.connector.commands_containing("git clone").is_empty());
    assert!(!h
        .connector
        .commands_containing("rm -f $HOME/.ssh/deploy_key_demo")
        .is_empty());
}

#[tokio::test]
async fn test_build_failure_fails_deployment() {
    let connector = healthy_node_host()
        .respond("cd /var/www/demo && npm install", "npm ERR! code ERESOLVE\n");
    let h = harness(connector, FakeGitHub::default());

    let result = h.orchestrator.deploy(&server(), &node_config()).await.unwrap();

    assert!(!result.success);
    assert!(result.message.contains("ERESOLVE"));
    assert_eq!(
        result.steps[StepName::InstallBuild.index()].status,
        StepStatus::Failure
    );
    assert!(h.connector.commands_containing("pm2 start").is_empty());
}

#[tokio::test]
async fn test_missing_package_json_fails_clone() {
    let connector = healthy_node_host().respond("ls -A", ".git\nREADME.md\n");
    let h = harness(connector, FakeGitHub::default());

    let result = h.orchestrator.deploy(&server(), &node_config()).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.message, "package.json not found in /var/www/demo");
}

#[tokio::test]
async fn test_connection_failure_fails_first_step() {
    let h = harness(FakeConnector::new().refusing(), FakeGitHub::default());

    let result = h.orchestrator.deploy(&server(), &node_config()).await.unwrap();

    assert!(!result.success);
    assert!(result.message.contains("Authentication failed for deploy@203.0.113.7"));
    let setup = &result.steps[StepName::SystemSetup.index()];
    assert_eq!(setup.status, StepStatus::Failure);
    assert_eq!(h.connector.connects(), 0);
}

#[tokio::test]
async fn test_python_app_uses_pip_and_interpreter() {
    let connector = healthy_node_host().respond("ls -A", "app.py\nrequirements.txt\n");
    let h = harness(connector, FakeGitHub::default());
    let config = DeployConfig {
        framework: Framework::Python,
        start_command: Some("app.py".to_string()),
        env_vars: Some("SECRET_KEY=abc".to_string()),
        ..node_config()
    };

    let result = h.orchestrator.deploy(&server(), &config).await.unwrap();

    assert!(result.success, "logs: {}", result.logs);
    assert!(!h.connector.commands_containing("pip3 install -r requirements.txt").is_empty());
    assert!(!h.connector.commands_containing("--interpreter python3").is_empty());
    assert!(!h.connector.commands_containing("> /var/www/demo/.env").is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_running() {
    let h = harness(healthy_node_host(), FakeGitHub::default());
    let config = DeployConfig {
        app_name: "!!!".to_string(),
        ..node_config()
    };

    let err = assert_err!(h.orchestrator.deploy(&server(), &config).await);
    assert!(matches!(err, LaunchError::ValidationError(_)));
    assert_eq!(h.connector.connects(), 0);
    assert!(h
        .store
        .find_by_host_and_user("203.0.113.7", "deploy")
        .await
        .unwrap()
        .is_empty());
}
