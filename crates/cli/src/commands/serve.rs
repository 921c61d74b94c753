use std::sync::Arc;

use anyhow::Result;
use notescan_http::{create_router, AppState};

use crate::Services;

pub(crate) async fn run(services: Services, host: &str, port: u16, max_upload_bytes: usize) -> Result<()> {
    tracing::info!(
        backend = ?services.registry.backend_kind(),
        transaction_mode = ?services.registry.transaction_mode(),
        "registry ready"
    );
    let state = Arc::new(AppState {
        ingestion: services.ingestion,
        reconcile: services.reconcile,
        registry: services.registry,
        max_upload_bytes,
    });

    let router = create_router(state);
    let addr = format!("{host}:{port}");
    tracing::info!(max_upload_bytes, "Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
