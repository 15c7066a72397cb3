//! Deployment module

pub mod certbot;
pub mod credentials;
pub mod fsm;
pub mod git;
pub mod host;
pub mod install;
pub mod nginx;
pub mod pipeline;
pub mod pm2;
pub mod steps;
pub mod teardown;

/// Parent directory of every project on the target
pub const WWW_ROOT: &str = "/var/www";

/// `sudo ` for regular users, nothing for root
pub fn sudo_prefix(username: &str) -> &'static str {
    if username == "root" {
        ""
    } else {
        "sudo "
    }
}

/// Project directory of a sanitized app name
pub fn project_dir(app_name: &str) -> String {
    format!("{}/{}", WWW_ROOT, app_name)
}

/// Last `count` non-empty lines of command output
pub fn tail(output: &str, count: usize) -> String {
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}
