use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use pomodex_core::auth::decode_access_token;
use pomodex_core::PomodexError;
use serde::{Deserialize, Serialize};

use crate::http::error_response::ApiError;
use crate::http::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub token: String,
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub user_id: String,
}

/// Called only by the terminal proxy, only over loopback. Verifies the
/// access token and that its subject owns `project_id`, then records the
/// connection for the inactivity sweeper.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let claims = decode_access_token(&body.token, &state.config.auth.token_signing_key)?;

    let project = state
        .db
        .projects()
        .find_by_id_for_user(&body.project_id, &claims.sub)
        .await?
        .ok_or(PomodexError::Auth)?;

    state.db.projects().touch_connection(&project.id, Utc::now().timestamp()).await?;

    Ok(Json(ValidateResponse { user_id: claims.sub }))
}
