//! Maps the shared `PomodexError` taxonomy onto HTTP status codes. Only
//! this adapter boundary knows about status codes; business logic never
//! does, matching the teacher's `DaemonError::IntoResponse` pattern.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pomodex_core::PomodexError;
use serde_json::json;

pub struct ApiError(pub PomodexError);

impl From<PomodexError> for ApiError {
    fn from(e: PomodexError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PomodexError::Auth => (StatusCode::UNAUTHORIZED, "authentication failed".to_string()),
            PomodexError::NotFound(_) => (StatusCode::NOT_FOUND, "not found".to_string()),
            PomodexError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            PomodexError::Precondition(msg) => (StatusCode::CONFLICT, msg.clone()),
            PomodexError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
            PomodexError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "temporarily unavailable".to_string()),
        };

        (status, Json(json!({ "error": true, "message": message }))).into_response()
    }
}
