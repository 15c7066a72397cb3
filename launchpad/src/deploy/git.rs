//! Git clone adapter
//!
//! git reports failures only through its output text, so every clone result
//! is classified here by substring.

use crate::errors::LaunchError;
use crate::models::deployment::Framework;
use crate::utils::shell_quote;

pub const AUTH_FAILED_MESSAGE: &str = "Git Authentication failed.";
pub const NOT_FOUND_MESSAGE: &str = "Repository not found. Check the URL and your access rights.";

/// Private key path of the ephemeral deploy key, relative to `$HOME`
pub fn deploy_key_path(app_name: &str) -> String {
    format!("$HOME/.ssh/deploy_key_{}", app_name)
}

/// Clone `branch` of an HTTPS URL into `target_dir`
pub fn https_clone_command(url: &str, branch: &str, target_dir: &str) -> String {
    format!(
        "GIT_TERMINAL_PROMPT=0 git clone -b {} --single-branch {} {}",
        shell_quote(branch),
        shell_quote(url),
        target_dir
    )
}

/// Clone over SSH with `GIT_SSH_COMMAND` pinned to the app's deploy key
pub fn ssh_clone_command(ssh_url: &str, branch: &str, target_dir: &str, app_name: &str) -> String {
    format!(
        "GIT_SSH_COMMAND=\"ssh -i {} -o IdentitiesOnly=yes\" git clone -b {} --single-branch {} {}",
        deploy_key_path(app_name),
        shell_quote(branch),
        shell_quote(ssh_url),
        target_dir
    )
}

/// Generate a fresh ed25519 key pair and print the public half
pub fn keygen_command(app_name: &str) -> String {
    let key = deploy_key_path(app_name);
    format!(
        "mkdir -p $HOME/.ssh && chmod 700 $HOME/.ssh && rm -f {key} {key}.pub && \
         ssh-keygen -t ed25519 -f {key} -N \"\" -C \"launchpad-{app}\" -q && cat {key}.pub",
        key = key,
        app = app_name,
    )
}

/// Trust github.com for the SSH clone
pub fn known_hosts_command() -> &'static str {
    "mkdir -p $HOME/.ssh && ssh-keyscan -t ed25519,rsa github.com >> $HOME/.ssh/known_hosts 2>/dev/null; echo done"
}

/// Remove the deploy key files
pub fn remove_key_command(app_name: &str) -> String {
    let key = deploy_key_path(app_name);
    format!("rm -f {key} {key}.pub", key = key)
}

/// First `ssh-ed25519` line of keygen output
pub fn parse_public_key(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("ssh-ed25519 "))
        .map(str::to_string)
}

/// Classify clone output.
///
/// `Authentication failed`, `could not read Username` and `fatal` are matched
/// case-sensitively. `not found` is matched case-insensitively, but only on
/// lines git or the remote emit as errors, so hints such as
/// `warning: templates not found` do not count.
pub fn classify_clone_output(output: &str) -> Result<(), LaunchError> {
    if output.contains("Authentication failed") || output.contains("could not read Username") {
        return Err(LaunchError::CloneAuthError(AUTH_FAILED_MESSAGE.to_string()));
    }
    let not_found = output.lines().any(|l| {
        let l = l.trim_start();
        (l.starts_with("fatal") || l.starts_with("remote:") || l.starts_with("ERROR"))
            && l.to_lowercase().contains("not found")
    });
    if not_found {
        return Err(LaunchError::CloneNotFoundError(NOT_FOUND_MESSAGE.to_string()));
    }
    if let Some(line) = output.lines().find(|l| l.contains("fatal")) {
        return Err(LaunchError::CloneGenericError(format!(
            "Git clone failed: {}",
            line.trim()
        )));
    }
    Ok(())
}

/// List the checked out project root
pub fn listing_command(dir: &str) -> String {
    format!("ls -A {} 2>/dev/null", dir)
}

/// Check the listing of the project root after cloning
pub fn verify_checkout(listing: &str, framework: Framework, dir: &str) -> Result<(), LaunchError> {
    let mut entries = listing.lines().map(str::trim).filter(|l| !l.is_empty());
    if framework.requires_package_json() {
        if entries.any(|e| e == "package.json") {
            return Ok(());
        }
        return Err(LaunchError::CloneGenericError(format!(
            "package.json not found in {}",
            dir
        )));
    }
    if entries.next().is_none() {
        return Err(LaunchError::CloneGenericError(format!(
            "{} is empty after clone",
            dir
        )));
    }
    Ok(())
}
