//! Server startup and graceful shutdown

use crate::state::AppState;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;

/// Start the server with graceful shutdown
pub async fn start_server(state: Arc<AppState>, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", state.config.server_port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        max_video_mb = state.config.max_video_size_bytes / 1024 / 1024,
        upload_ticket_ttl_secs = state.config.upload_ticket_ttl_secs,
        stream_url_ttl_secs = state.config.stream_url_ttl_secs,
        processing_max_workers = state.config.processing_max_workers,
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(queue) = state.video.queue() {
        queue.shutdown().await;
    }
    crate::telemetry::shutdown_telemetry().await;

    Ok(())
}

/// Resolves on SIGINT or SIGTERM. In-flight requests finish; the processing
/// queue is drained afterwards by [`start_server`].
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Shutdown requested, no longer accepting connections");
}
