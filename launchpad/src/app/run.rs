//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::LaunchError;
use crate::server::serve::serve;

/// Serve the HTTP API until `shutdown_signal` resolves, then close all sessions
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), LaunchError> {
    info!("Initializing launchpad...");

    let state = Arc::new(AppState::init(&options).await?);
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    let server_handle = serve(&options.server, state.clone(), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_signal.await;
    info!("Shutdown signal received, stopping HTTP server...");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(options.max_shutdown_delay, server_handle).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => error!("HTTP server failed: {}", e),
        Ok(Err(e)) => error!("HTTP server task panicked: {}", e),
        Err(_) => warn!(
            "HTTP server did not stop within {:?}",
            options.max_shutdown_delay
        ),
    }

    state.shutdown().await?;
    info!("Launchpad stopped");
    Ok(())
}
