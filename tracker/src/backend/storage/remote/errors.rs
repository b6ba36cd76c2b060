use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Failures surfaced by the remote repository
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response; `message` is the best human-readable text found
    #[error("{message}")]
    Http { status: u16, message: String },

    /// A 401 could not be recovered because the token refresh failed.
    /// The auth session has already been logged out.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Connection, timeout, or body decoding failure
    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// HTTP status of the failed response, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn text_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(nested) => match nested.get("message") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Pull a readable message out of an error response body.
///
/// Looks at `message`, then `error` (a string or an object with `message`),
/// then `errorMessage`, and decorates it with `code` and `details` when
/// present. Bodies that are not JSON or carry none of those fields fall back
/// to `"<action> failed: <status> <reason>"`.
pub fn extract_error_message(action: &str, status: StatusCode, body: &str) -> String {
    let fallback = || {
        format!(
            "{} failed: {} {}",
            action,
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .trim_end()
        .to_string()
    };

    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    let Some(message) = ["message", "error", "errorMessage"]
        .iter()
        .find_map(|key| text_field(&parsed, key))
    else {
        return fallback();
    };

    let mut text = message;
    if let Some(code) = parsed.get("code").and_then(scalar_text) {
        text = format!("{} (code: {})", text, code);
    }
    if let Some(details) = parsed.get("details").and_then(scalar_text) {
        text = format!("{}: {}", text, details);
    }
    text
}
