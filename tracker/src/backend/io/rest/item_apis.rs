//! # REST API for Items
//!
//! Item collection endpoints plus the per-item revision history.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::{error, info, warn};
use shared::{ItemHistoryPayload, ItemsPayload};

use super::internal_error;
use crate::backend::AppState;

/// List all items
pub async fn list_items(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /items");

    match state.repository.get_items().await {
        Ok(items) => (StatusCode::OK, Json(ItemsPayload { items })).into_response(),
        Err(e) => internal_error("Fetch items", e),
    }
}

/// Replace the item collection and record the resulting revisions
pub async fn save_items(State(state): State<AppState>, Json(payload): Json<ItemsPayload>) -> impl IntoResponse {
    info!("POST /items - {} items", payload.items.len());

    let _guard = state.item_writes.lock().await;
    let previous = match state.repository.get_items().await {
        Ok(items) => items,
        Err(e) => return internal_error("Fetch items", e),
    };

    if let Err(e) = state.repository.save_items(&payload.items).await {
        return internal_error("Save items", e);
    }

    if let Some(revisions) = &state.revisions {
        match revisions.record_save(&previous, &payload.items).await {
            Ok(count) => info!("Recorded {} revision(s)", count),
            Err(e) => error!("Failed to record item revisions: {:#}", e),
        }
    }

    (StatusCode::OK, Json(payload)).into_response()
}

/// Permanently delete one item
pub async fn delete_item(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    info!("DELETE /items/{}", id);

    let _guard = state.item_writes.lock().await;
    let existing = match state.repository.get_items().await {
        Ok(items) => items.into_iter().find(|item| item.id == id),
        Err(e) => return internal_error("Fetch items", e),
    };

    if let Err(e) = state.repository.delete_item(&id).await {
        return internal_error("Delete item", e);
    }

    match (&state.revisions, existing) {
        (Some(revisions), Some(item)) => {
            if let Err(e) = revisions.record_delete(&item).await {
                error!("Failed to record deletion of item {}: {:#}", id, e);
            }
        }
        (_, None) => warn!("Deleted item {} was not stored", id),
        _ => {}
    }

    StatusCode::NO_CONTENT.into_response()
}

/// Revision history of one item, newest first
pub async fn get_item_history(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    info!("GET /items/{}/history", id);

    let result = match &state.revisions {
        Some(revisions) => revisions.history(&id).await,
        None => state.repository.get_item_history(&id).await,
    };
    let history = match result {
        Ok(history) => history,
        Err(e) => return internal_error("Fetch item history", e),
    };

    (StatusCode::OK, Json(ItemHistoryPayload { history })).into_response()
}
