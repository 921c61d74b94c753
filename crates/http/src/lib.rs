//! HTTP API for the notescan serial registry.

#![allow(missing_docs, reason = "Internal crate with self-explanatory API")]
#![allow(unreachable_pub, reason = "pub items are re-exported")]
#![allow(clippy::absolute_paths, reason = "Explicit paths for clarity")]
#![allow(unused_results, reason = "Some results are intentionally ignored")]
#![allow(missing_debug_implementations, reason = "Internal types")]
#![allow(clippy::missing_docs_in_private_items, reason = "Internal crate")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::min_ident_chars, reason = "Short closure params are idiomatic")]
#![allow(clippy::exhaustive_structs, reason = "HTTP types are stable")]
#![allow(clippy::single_call_fn, reason = "Helper functions improve readability")]

pub mod api_error;
mod handlers;
mod query_types;
mod response_types;
mod upload;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use notescan_service::{IngestionService, ReconcileService, RegistryService};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Header carrying the wipe confirmation phrase on `POST /reset`.
pub const CONFIRM_RESET_HEADER: &str = "x-confirm-reset";

/// Shared state for all handlers. The three services share one registry and
/// one wipe gate.
pub struct AppState {
    pub ingestion: Arc<IngestionService>,
    pub reconcile: Arc<ReconcileService>,
    pub registry: Arc<RegistryService>,
    /// Request body cap in bytes, applied to every route.
    pub max_upload_bytes: usize,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(handlers::registry::stats))
        .route("/events", get(handlers::ingest::sse_events))
        .route("/extract", post(handlers::ingest::extract))
        .route("/serials", get(handlers::registry::list_serials))
        .route("/serials/batch", post(handlers::registry::batch_add))
        // PUT takes a record id, DELETE takes a serial number.
        .route(
            "/serials/{key}",
            put(handlers::registry::edit).delete(handlers::registry::delete),
        )
        .route("/records", get(handlers::registry::records))
        .route("/export", get(handlers::transfer::export))
        .route("/import", post(handlers::transfer::import))
        .route("/reset", post(handlers::registry::reset))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
