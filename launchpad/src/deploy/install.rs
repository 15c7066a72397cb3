//! Dependency install, build and `.env` handling

use crate::errors::LaunchError;
use crate::models::deployment::{DeployConfig, Framework};
use crate::utils::shell_quote;

const BUILD_FAILURE_MARKERS: [&str; 6] = [
    "npm ERR!",
    "npm error",
    "ERR!",
    "Failed to compile",
    "Build failed",
    "command not found",
];

/// Write raw `.env` text into the project directory
pub fn env_file_command(dir: &str, env_vars: &str) -> String {
    format!(
        "printf '%s\\n' {} > {}/.env && chmod 600 {}/.env",
        shell_quote(env_vars.trim_end()),
        dir,
        dir
    )
}

/// Dependency install for the framework, `None` when nothing is needed
pub fn install_command(dir: &str, framework: Framework) -> Option<String> {
    match framework {
        Framework::Node | Framework::Next => Some(format!("cd {} && npm install 2>&1", dir)),
        Framework::Python => Some(format!(
            "cd {} && if [ -f requirements.txt ]; then pip3 install -r requirements.txt 2>&1; else echo 'no requirements.txt'; fi",
            dir
        )),
        Framework::Static | Framework::Other => Some(format!(
            "cd {} && if [ -f package.json ]; then npm install 2>&1; else echo 'no package.json'; fi",
            dir
        )),
    }
}

/// Build command: the custom one, else `npm run build` for Next.js
pub fn build_command(dir: &str, config: &DeployConfig) -> Option<String> {
    let build = match (config.build_command(), config.framework) {
        (Some(custom), _) => custom.to_string(),
        (None, Framework::Next) => "npm run build".to_string(),
        (None, _) => return None,
    };
    Some(format!("cd {} && {} 2>&1", dir, build))
}

/// npm and common bundlers only signal failure through their output
pub fn classify_build_output(output: &str) -> Result<(), LaunchError> {
    for line in output.lines() {
        if BUILD_FAILURE_MARKERS.iter().any(|m| line.contains(m)) {
            return Err(LaunchError::BuildError(format!(
                "Build failed: {}",
                line.trim()
            )));
        }
    }
    Ok(())
}
