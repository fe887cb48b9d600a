use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use pomodex_core::auth::{
    encode_access_token, generate_refresh_token, hash_password, hash_refresh_token, verify_password,
};
use pomodex_core::db::RefreshToken;
use pomodex_core::PomodexError;
use serde_json::json;
use uuid::Uuid;

use crate::http::error_response::ApiError;
use crate::http::AppState;
use crate::models::{LoginRequest, RefreshRequest, RegisterRequest, TokenPairResponse};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let password_hash = hash_password(&body.password)?;
    let user_id = Uuid::new_v4().to_string();

    state.db.users().create(&user_id, &body.email, &password_hash, Utc::now().timestamp()).await?;

    Ok((StatusCode::CREATED, Json(json!({ "user_id": user_id }))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let user = state.db.users().find_by_email(&body.email).await?.ok_or(PomodexError::Auth)?;
    verify_password(&body.password, &user.password_hash)?;

    issue_token_pair(&state, &user.id).await.map(Json)
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let presented_hash = hash_refresh_token(&body.refresh_token);
    let stored = state.db.refresh_tokens().find_by_hash(&presented_hash).await?.ok_or(PomodexError::Auth)?;

    // Single-use rotation: the presented token is deleted whether or not
    // the rest of the exchange succeeds.
    state.db.refresh_tokens().delete(&stored.id).await?;

    let now = Utc::now().timestamp();
    if stored.expires_at < now {
        return Err(PomodexError::Auth.into());
    }

    issue_token_pair(&state, &stored.user_id).await.map(Json)
}

async fn issue_token_pair(state: &AppState, user_id: &str) -> Result<TokenPairResponse, ApiError> {
    let now = Utc::now().timestamp();
    let access_token = encode_access_token(user_id, &state.config.auth.token_signing_key, state.config.auth.access_token_ttl_secs, now)?;

    let refresh_plaintext = generate_refresh_token();
    let refresh_token = RefreshToken {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        token_hash: hash_refresh_token(&refresh_plaintext),
        expires_at: now + state.config.auth.refresh_token_ttl_days * 86_400,
        created_at: now,
    };
    state.db.refresh_tokens().create(&refresh_token).await?;

    Ok(TokenPairResponse { access_token, refresh_token: refresh_plaintext })
}
