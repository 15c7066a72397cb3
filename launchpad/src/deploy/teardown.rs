//! Removal of a deployed application from its host

use tracing::{info, warn};

use crate::deploy::{nginx, pm2, project_dir};
use crate::errors::LaunchError;
use crate::session::{execute, Session};

/// Stop the process, drop the nginx site and delete the project directory.
///
/// Every command is attempted even if an earlier one fails; failures are
/// returned as warnings. Backups made by earlier deployments are kept.
pub async fn teardown_app(
    session: &Session,
    app_name: &str,
    sudo: &str,
) -> Result<Vec<String>, LaunchError> {
    if app_name.trim_matches('-').is_empty() {
        return Err(LaunchError::ValidationError(
            "Refusing to tear down an app without a name".to_string(),
        ));
    }

    let commands = [
        ("stop process", pm2::stop_command(app_name)),
        ("delete process", pm2::delete_command(app_name)),
        ("save process list", pm2::save_command().to_string()),
        ("remove nginx site", nginx::remove_site_command(app_name, sudo)),
        ("reload nginx", nginx::reload_command(sudo)),
        (
            "remove project directory",
            format!("{}rm -rf {}", sudo, project_dir(app_name)),
        ),
    ];

    let mut warnings = Vec::new();
    for (what, command) in commands.iter() {
        match execute(session, command).await {
            Ok(output) => {
                if let Err(e) = pm2::classify_output(&output) {
                    warn!("Teardown of {}: {} reported {}", app_name, what, e);
                    warnings.push(format!("{}: {}", what, e));
                }
            }
            Err(e) => {
                warn!("Teardown of {}: {} failed: {}", app_name, what, e);
                warnings.push(format!("{}: {}", what, e));
            }
        }
    }

    info!(
        "Tore down {} with {} warning(s)",
        app_name,
        warnings.len()
    );
    Ok(warnings)
}
