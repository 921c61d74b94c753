use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use notescan_service::ExportFormat;

use crate::api_error::ApiError;
use crate::query_types::ExportQuery;
use crate::response_types::ImportResponse;
use crate::upload::collect_files;
use crate::AppState;

pub async fn export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let format: ExportFormat = query.format.parse()?;
    let file = state.reconcile.export(format).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [(header::CONTENT_TYPE, file.content_type.to_owned()), (header::CONTENT_DISPOSITION, disposition)],
        file.bytes,
    ))
}

/// Imports the first uploaded file as CSV text.
pub async fn import(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let file = collect_files(&mut multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::BadRequest("no CSV file uploaded".into()))?;
    let text = String::from_utf8(file.bytes)
        .map_err(|_| ApiError::BadRequest(format!("{} is not UTF-8 text", file.filename)))?;

    let report = state.reconcile.import_csv(&text).await?;
    Ok(Json(ImportResponse { success: true, message: report.message(), report }))
}
