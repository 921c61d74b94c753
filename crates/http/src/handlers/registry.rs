use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use notescan_service::ManualAddResult;
use notescan_storage::{RecordPage, RegistryStats};

use crate::api_error::ApiError;
use crate::query_types::{BatchAddRequest, EditRequest, RecordsQuery};
use crate::response_types::{DeleteResponse, EditResponse, ResetResponse};
use crate::{AppState, CONFIRM_RESET_HEADER};

pub async fn list_serials(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.registry.list_serials().await?))
}

pub async fn records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordPage>, ApiError> {
    let page =
        state.registry.page(query.page, query.capped_limit(), query.q.as_deref()).await?;
    Ok(Json(page))
}

pub async fn batch_add(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchAddRequest>,
) -> Result<Json<ManualAddResult>, ApiError> {
    Ok(Json(state.registry.add_manual(&request.serials).await?))
}

pub async fn edit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<EditRequest>,
) -> Result<Json<EditResponse>, ApiError> {
    let id: i64 =
        id.parse().map_err(|_| ApiError::BadRequest(format!("invalid record id {id:?}")))?;
    let record = state.registry.edit(id, &request.serial_number, request.status).await?;
    Ok(Json(EditResponse { success: true, record }))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(serial): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.registry.delete(&serial).await?;
    Ok(Json(DeleteResponse { success: true, serial_number: serial }))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<RegistryStats>, ApiError> {
    Ok(Json(state.registry.stats().await?))
}

pub async fn reset(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, ApiError> {
    let confirmation = headers.get(CONFIRM_RESET_HEADER).and_then(|v| v.to_str().ok());
    state.registry.wipe(confirmation).await?;
    Ok(Json(ResetResponse { success: true, message: "registry wiped" }))
}
