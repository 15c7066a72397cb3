//! Host preparation: packages and the project directory

use crate::deploy::{project_dir, WWW_ROOT};
use crate::errors::LaunchError;
use crate::models::deployment::Framework;

/// Printed when an existing project directory was moved aside
pub const BACKUP_MARKER: &str = "LAUNCHPAD_BACKUP";

/// Printed as the last link of the directory chain
pub const DIR_READY_MARKER: &str = "LAUNCHPAD_DIR_READY";

/// Non-interactive install of git, nginx, node and pm2.
///
/// Node and pm2 are only installed when missing.
pub fn system_setup_command(framework: Framework, sudo: &str) -> String {
    let apt = format!("{}env DEBIAN_FRONTEND=noninteractive apt-get", sudo);
    let mut packages = vec!["git", "nginx", "curl"];
    if framework == Framework::Python {
        packages.extend(["python3", "python3-pip", "python3-venv"]);
    }

    format!(
        "{apt} update -y && {apt} install -y {packages} && \
         (command -v node >/dev/null 2>&1 || (curl -fsSL https://deb.nodesource.com/setup_20.x | {sudo}bash - && {apt} install -y nodejs)) && \
         (command -v pm2 >/dev/null 2>&1 || {sudo}npm install -g pm2) && \
         echo \"node $(node --version) / pm2 $(pm2 --version)\"",
        apt = apt,
        packages = packages.join(" "),
        sudo = sudo,
    )
}

/// apt reports hard failures on lines starting with `E: `
pub fn classify_setup_output(output: &str) -> Result<(), LaunchError> {
    if let Some(line) = output.lines().find(|l| l.starts_with("E: ")) {
        return Err(LaunchError::SystemSetupError(line.trim().to_string()));
    }
    if let Some(line) = output.lines().find(|l| l.contains("npm ERR!")) {
        return Err(LaunchError::SystemSetupError(line.trim().to_string()));
    }
    Ok(())
}

/// Path an existing project is moved to
pub fn backup_dir(app_name: &str, unix_secs: i64) -> String {
    format!("{}_backup_{}", project_dir(app_name), unix_secs)
}

/// Make `/var/www` owned by `username` and its login group, move any previous
/// project aside and recreate an empty project directory. Nothing is deleted.
pub fn prepare_directory_command(
    app_name: &str,
    username: &str,
    unix_secs: i64,
    sudo: &str,
) -> String {
    let dir = project_dir(app_name);
    let backup = backup_dir(app_name, unix_secs);
    format!(
        "{sudo}mkdir -p {www} && {sudo}chown {user}: {www} && \
         if [ -d {dir} ]; then {sudo}mv {dir} {backup} && echo \"{marker} {backup}\"; fi && \
         mkdir -p {dir} && ls -A {dir} | wc -l && echo {ready}",
        sudo = sudo,
        www = WWW_ROOT,
        user = username,
        dir = dir,
        backup = backup,
        marker = BACKUP_MARKER,
        ready = DIR_READY_MARKER,
    )
}

pub fn classify_directory_output(output: &str) -> Result<(), LaunchError> {
    if let Some(line) = output
        .lines()
        .find(|l| l.contains("Permission denied") || l.contains("cannot "))
    {
        return Err(LaunchError::RemoteCommandError(line.trim().to_string()));
    }
    Ok(())
}

/// The directory chain only counts as done once it printed its last marker
pub fn classify_prepare_output(output: &str) -> Result<(), LaunchError> {
    classify_directory_output(output)?;
    if output.lines().any(|l| l.trim() == DIR_READY_MARKER) {
        return Ok(());
    }
    let reason = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with(BACKUP_MARKER))
        .unwrap_or("no output");
    Err(LaunchError::RemoteCommandError(format!(
        "Preparing the project directory stopped early: {}",
        reason
    )))
}

/// Backup location reported by [`prepare_directory_command`], if any
pub fn reported_backup(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|l| l.trim().strip_prefix(BACKUP_MARKER))
        .map(|rest| rest.trim().to_string())
}
