//! Static bearer token check for the REST server.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use log::warn;
use shared::ErrorBody;

use crate::backend::AppState;

/// Reject requests without `Authorization: Bearer <token>` when a token is configured
pub async fn require_bearer_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(request).await;
    };

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == expected);

    if authorized {
        return next.run(request).await;
    }

    warn!("Rejected unauthorized {} {}", request.method(), request.uri().path());
    let body = ErrorBody {
        message: "Unauthorized".to_string(),
        code: Some("UNAUTHORIZED".to_string()),
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
