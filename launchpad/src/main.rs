//! Launchpad - Entry Point
//!
//! Serves the deployment API, or runs a single deployment from the command line.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info};

use launchpad::app::options::AppOptions;
use launchpad::app::run::run;
use launchpad::app::state::AppState;
use launchpad::filesys::file::File;
use launchpad::logs::{init_logging, LogOptions};
use launchpad::models::deployment::DeployConfig;
use launchpad::models::server::ServerRecord;
use launchpad::storage::layout::StorageLayout;
use launchpad::storage::settings::Settings;
use launchpad::utils::version_info;

#[tokio::main]
async fn main() {
    // Parse --key=value arguments and bare --flags
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let layout = StorageLayout::default();
    let settings_file = match cli_args.get("settings") {
        Some(path) => File::new(PathBuf::from(path)),
        None => layout.settings_file(),
    };
    let settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {}", e);
            std::process::exit(1);
        }
    };

    let deploy_mode = cli_args.contains_key("deploy");
    let log_options = LogOptions {
        log_level: settings.log_level,
        // Keep stdout clean for the JSON result in one-shot mode
        stdout: !deploy_mode,
        log_dir: (!deploy_mode).then(|| layout.logs_dir().path().to_path_buf()),
        json_format: settings.log_json,
    };
    let _log_guard = match init_logging(log_options.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            // Usually an unwritable log directory; fall back to stdout only
            eprintln!("Failed to initialize logging: {e}");
            init_logging(LogOptions {
                log_dir: None,
                ..log_options
            })
            .ok()
            .flatten()
        }
    };

    let options = AppOptions::from_settings(&settings, layout);

    if deploy_mode {
        if let Err(e) = deploy_once(&cli_args, options).await {
            eprintln!("Deployment failed: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    info!("Running launchpad {} with options: {:?}", version.version, options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run launchpad: {e}");
        std::process::exit(1);
    }
}

/// `--deploy --config=<file> --host= --user= --password= [--port=]`
async fn deploy_once(cli_args: &HashMap<String, String>, options: AppOptions) -> anyhow::Result<()> {
    let required = |key: &str| {
        cli_args
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .with_context(|| format!("--{} is required", key))
    };

    let config_path = required("config")?;
    let config: DeployConfig = File::new(PathBuf::from(&config_path))
        .read_json()
        .await
        .with_context(|| format!("reading deploy config {}", config_path))?;

    let port = match cli_args.get("port") {
        Some(port) => port
            .parse::<u16>()
            .with_context(|| format!("invalid --port {}", port))?,
        None => options.default_ssh_port,
    };
    let server = ServerRecord {
        id: String::new(),
        host: required("host")?,
        port,
        username: required("user")?,
        password: required("password")?,
    };

    let state = Arc::new(AppState::init(&options).await?);
    let server = state.store.save_server(server).await?;
    let result = state.orchestrator.deploy(&server, &config).await;
    state.shutdown().await?;

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        bail!("{}", result.message);
    }
    Ok(())
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Unable to install signal handlers, waiting for Ctrl+C only");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
