//! nginx reverse proxy adapter

use crate::errors::LaunchError;
use crate::utils::shell_quote;

pub const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
pub const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";

/// `nginx -t` prints this on a valid configuration
const SYNTAX_OK_MARKER: &str = "successful";

pub fn site_available(app_name: &str) -> String {
    format!("{}/{}", SITES_AVAILABLE, app_name)
}

pub fn site_enabled(app_name: &str) -> String {
    format!("{}/{}", SITES_ENABLED, app_name)
}

/// `server_name` must be a single hostname or address token
pub fn validate_server_name(domain: &str) -> Result<(), LaunchError> {
    if domain.is_empty()
        || !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '*'))
    {
        return Err(LaunchError::ValidationError(format!(
            "Invalid domain for nginx: {}",
            domain
        )));
    }
    Ok(())
}

/// Virtual host proxying `domain` on port 80 to the local app, WebSocket aware
pub fn render_site(domain: &str, port: u16) -> String {
    format!(
        r#"server {{
    listen 80;
    server_name {domain};

    location / {{
        proxy_pass http://localhost:{port};
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection 'upgrade';
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_cache_bypass $http_upgrade;
    }}
}}"#,
        domain = domain,
        port = port
    )
}

/// Write the site file and link it into `sites-enabled`
pub fn install_site_command(app_name: &str, site: &str, sudo: &str) -> String {
    format!(
        "printf '%s\\n' {content} | {sudo}tee {available} > /dev/null && {sudo}ln -sf {available} {enabled}",
        content = shell_quote(site),
        sudo = sudo,
        available = site_available(app_name),
        enabled = site_enabled(app_name),
    )
}

pub fn test_config_command(sudo: &str) -> String {
    format!("{}nginx -t 2>&1", sudo)
}

pub fn reload_command(sudo: &str) -> String {
    format!("{}systemctl reload nginx 2>&1 || {}nginx -s reload 2>&1", sudo, sudo)
}

/// Remove both site files of an app
pub fn remove_site_command(app_name: &str, sudo: &str) -> String {
    format!(
        "{sudo}rm -f {enabled} {available}",
        sudo = sudo,
        enabled = site_enabled(app_name),
        available = site_available(app_name),
    )
}

/// Reload is only allowed once `nginx -t` reported success
pub fn classify_test_output(output: &str) -> Result<(), LaunchError> {
    if output.contains(SYNTAX_OK_MARKER) {
        return Ok(());
    }
    let reason = output
        .lines()
        .map(str::trim)
        .find(|l| l.contains("emerg") || l.contains("failed"))
        .or_else(|| output.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("nginx -t produced no output");
    Err(LaunchError::ConfigValidationError(reason.to_string()))
}
