//! # REST API for Categories

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use log::info;
use shared::CategoriesPayload;

use super::internal_error;
use crate::backend::AppState;

pub async fn list_categories(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /categories");

    match state.repository.get_categories().await {
        Ok(categories) => (StatusCode::OK, Json(CategoriesPayload { categories })).into_response(),
        Err(e) => internal_error("Fetch categories", e),
    }
}

/// Replace the category list; order is kept as sent
pub async fn save_categories(
    State(state): State<AppState>,
    Json(payload): Json<CategoriesPayload>,
) -> impl IntoResponse {
    info!("POST /categories - {} categories", payload.categories.len());

    let _guard = state.category_writes.lock().await;
    match state.repository.save_categories(&payload.categories).await {
        Ok(()) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => internal_error("Save categories", e),
    }
}
