use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{ConfigArgs, ServerConfig};
use crate::error::ServerError;

pub async fn run(args: ConfigArgs) -> Result<(), ServerError> {
    tracing::info!("job-admin starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- Partitions ---
    let registry = Arc::new(super::build_registry(&config)?);

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- API server (HTTP) ---
    let bind = config.bind.clone();
    let port = config.api_port;
    let api_token = token.clone();
    let mut api_handle = tokio::spawn(async move {
        jobs_api_server::run(&bind, port, registry, api_token).await
    });
    tracing::info!(bind = %config.bind, port, "api server listening");

    // --- Wait for Ctrl+C, or the server dying on its own ---
    tokio::select! {
        res = &mut api_handle => {
            return match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ServerError::Api(e)),
                Err(e) => Err(ServerError::Api(format!("api task: {e}"))),
            };
        }
        sig = tokio::signal::ctrl_c() => sig?,
    }

    tracing::info!("shutting down...");
    token.cancel();
    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "api server error"),
        Err(e) => tracing::error!(error = %e, "api task failed"),
    }

    tracing::info!("shutdown complete");
    Ok(())
}
