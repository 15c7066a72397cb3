//! certbot adapter for Let's Encrypt certificates

use std::net::IpAddr;

use crate::errors::LaunchError;
use crate::utils::shell_quote;

const SUCCESS_MARKERS: [&str; 3] = [
    "Congratulations",
    "Successfully deployed certificate",
    "Certificate not yet due for renewal",
];

/// Let's Encrypt does not issue certificates for bare IP addresses
pub fn is_ip_address(domain: &str) -> bool {
    domain.parse::<IpAddr>().is_ok()
}

pub fn install_command(sudo: &str) -> String {
    format!(
        "(command -v certbot >/dev/null 2>&1 || {sudo}env DEBIAN_FRONTEND=noninteractive apt-get install -y certbot python3-certbot-nginx) 2>&1",
        sudo = sudo
    )
}

/// Obtain a certificate and let certbot rewrite the site for HTTPS
pub fn issue_command(domain: &str, email: Option<&str>, sudo: &str) -> String {
    let account = match email {
        Some(email) => format!("-m {}", shell_quote(email)),
        None => "--register-unsafely-without-email".to_string(),
    };
    format!(
        "{sudo}certbot --nginx -d {domain} --non-interactive --agree-tos {account} --redirect 2>&1",
        sudo = sudo,
        domain = domain,
        account = account,
    )
}

pub fn classify_output(output: &str) -> Result<(), LaunchError> {
    if SUCCESS_MARKERS.iter().any(|m| output.contains(m)) {
        return Ok(());
    }
    if output.contains("DNS problem") || output.contains("NXDOMAIN") {
        return Err(LaunchError::CertificateError(
            "Domain does not resolve to this server (DNS problem)".to_string(),
        ));
    }
    let reason = output
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty())
        .unwrap_or("certbot produced no output");
    Err(LaunchError::CertificateError(reason.to_string()))
}
