//! Command executor

use tracing::debug;

use crate::errors::LaunchError;
use crate::session::registry::Session;

/// Run `command` on the session's connection and return combined output.
///
/// No exit status is surfaced. Callers classify the text themselves, which is
/// what the adapters under `deploy::` do. The command text is not logged since
/// it may carry repository credentials.
pub async fn execute(session: &Session, command: &str) -> Result<String, LaunchError> {
    session.touch();
    let output = session.transport().exec(command).await?;
    debug!(
        "[{}] command finished, {} bytes of output",
        session.key(),
        output.len()
    );
    Ok(output)
}
