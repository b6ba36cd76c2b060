//! # REST API for History Snapshots

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;
use shared::HistoryPayload;

use super::internal_error;
use crate::backend::AppState;

pub async fn list_history(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /history");

    match state.repository.get_history().await {
        Ok(history) => (StatusCode::OK, Json(HistoryPayload { history })).into_response(),
        Err(e) => internal_error("Fetch history", e),
    }
}

/// Replace the stored history
pub async fn save_history(State(state): State<AppState>, Json(payload): Json<HistoryPayload>) -> impl IntoResponse {
    info!("POST /history - {} entries", payload.history.len());

    let _guard = state.history_writes.lock().await;
    match state.repository.save_history(&payload.history).await {
        Ok(()) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => internal_error("Save history", e),
    }
}

pub async fn delete_history_item(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    info!("DELETE /history/{}", id);

    let _guard = state.history_writes.lock().await;
    match state.repository.delete_history_item(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error("Delete history entry", e),
    }
}
