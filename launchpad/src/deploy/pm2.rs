//! pm2 process manager adapter

use crate::errors::LaunchError;
use crate::models::deployment::{DeployConfig, Framework};
use crate::utils::shell_quote;

const NODE_DEFAULT_ENTRY: &str = "dist/index.js";
const GENERIC_DEFAULT_ENTRY: &str = "index.js";

/// The `pm2 start`/`pm2 serve` invocation for the configured framework
fn launch_invocation(dir: &str, app_name: &str, port: u16, config: &DeployConfig) -> String {
    match config.framework {
        Framework::Next => format!(
            "pm2 start node_modules/next/dist/bin/next --name {} -- start -p {}",
            app_name, port
        ),
        Framework::Node => {
            // `start_command` is often `npm start`; pm2 needs a script path.
            let entry = config
                .entry_file()
                .or(config.start_command())
                .unwrap_or(NODE_DEFAULT_ENTRY);
            format!("pm2 start {} --name {}", shell_quote(entry), app_name)
        }
        Framework::Static => {
            let root = match config.entry_file() {
                Some(entry) => format!("{}/{}", dir, entry.trim_matches('/')),
                None => dir.to_string(),
            };
            format!("pm2 serve {} {} --name {} --spa", shell_quote(&root), port, app_name)
        }
        Framework::Python | Framework::Other => {
            let script = config
                .start_command()
                .or(config.entry_file())
                .unwrap_or(GENERIC_DEFAULT_ENTRY);
            let interpreter = if script.ends_with(".py") {
                " --interpreter python3"
            } else {
                ""
            };
            format!(
                "pm2 start {} --name {}{}",
                shell_quote(script),
                app_name,
                interpreter
            )
        }
    }
}

/// Replace any previous process of the same name, start, then persist the list
pub fn start_command(dir: &str, app_name: &str, port: u16, config: &DeployConfig) -> String {
    format!(
        "cd {dir} && (pm2 delete {app} >/dev/null 2>&1 || true) && PORT={port} {launch} 2>&1 && pm2 save 2>&1",
        dir = dir,
        app = app_name,
        port = port,
        launch = launch_invocation(dir, app_name, port, config),
    )
}

/// Register pm2 with systemd so processes survive reboots. Best effort.
pub fn startup_command(username: &str, sudo: &str) -> String {
    format!(
        "{sudo}env PATH=$PATH:/usr/bin pm2 startup systemd -u {user} --hp $HOME 2>&1 || true",
        sudo = sudo,
        user = username
    )
}

pub fn stop_command(app_name: &str) -> String {
    format!("pm2 stop {} 2>&1", app_name)
}

pub fn restart_command(app_name: &str) -> String {
    format!("pm2 restart {} 2>&1", app_name)
}

pub fn delete_command(app_name: &str) -> String {
    format!("pm2 delete {} 2>&1", app_name)
}

pub fn save_command() -> &'static str {
    "pm2 save 2>&1"
}

/// Last `lines` log lines without following
pub fn logs_command(app_name: &str, lines: u32) -> String {
    format!("pm2 logs {} --lines {} --nostream 2>&1", app_name, lines)
}

pub fn classify_output(output: &str) -> Result<(), LaunchError> {
    if let Some(line) = output.lines().find(|l| {
        l.contains("[PM2][ERROR]") || l.contains("Script not found") || l.contains("command not found")
    }) {
        return Err(LaunchError::ProcessManagerError(line.trim().to_string()));
    }
    Ok(())
}
