//! # REST API Interface Layer
//!
//! HTTP endpoints over a [`FinanceRepository`](crate::backend::storage::FinanceRepository).
//!
//! | Method | Path                  | Body           | Response       |
//! |--------|-----------------------|----------------|----------------|
//! | GET    | `/items`              |                | `{items}`      |
//! | POST   | `/items`              | `{items}`      | `{items}`      |
//! | DELETE | `/items/:id`          |                | 204            |
//! | GET    | `/items/:id/history`  |                | `{history}`    |
//! | GET    | `/history`            |                | `{history}`    |
//! | POST   | `/history`            | `{history}`    | `{history}`    |
//! | DELETE | `/history/:id`        |                | 204            |
//! | GET    | `/categories`         |                | `{categories}` |
//! | POST   | `/categories`         | `{categories}` | `{categories}` |
//!
//! POST bodies replace the whole collection. Repository failures become
//! `500 {"message": ...}`.

pub mod auth;
pub mod category_apis;
pub mod history_apis;
pub mod item_apis;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use log::error;
use shared::ErrorBody;

pub use auth::require_bearer_token;
pub use category_apis::*;
pub use history_apis::*;
pub use item_apis::*;

/// 500 response carrying the error chain as `message`
pub(crate) fn internal_error(action: &str, e: anyhow::Error) -> Response {
    error!("{} failed: {:#}", action, e);
    let body = ErrorBody {
        message: format!("{:#}", e),
        code: None,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
