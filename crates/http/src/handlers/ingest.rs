use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use notescan_service::IngestSummary;
use tokio::sync::broadcast::error::RecvError;

use crate::api_error::ApiError;
use crate::upload::collect_files;
use crate::AppState;

/// Always 200 with a summary once files are present; per-file failures live
/// inside `results`.
pub async fn extract(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<IngestSummary>, ApiError> {
    let files = collect_files(&mut multipart).await?;
    if files.is_empty() {
        return Err(ApiError::BadRequest("no files uploaded".into()));
    }
    Ok(Json(state.ingestion.ingest(files).await?))
}

pub async fn sse_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.ingestion.events().subscribe();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().json_data(&event) {
                    Ok(sse) => yield Ok(sse),
                    Err(e) => tracing::warn!(error = %e, "failed to encode SSE event"),
                },
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("SSE client lagged by {} messages", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}
