use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::Json;
use pomodex_core::PomodexError;
use serde_json::json;

use crate::http::error_response::ApiError;
use crate::http::middleware::auth::AuthenticatedUser;
use crate::http::AppState;
use crate::models::{CreateProjectRequest, ProjectCreatedView, ProjectView};

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ProjectView>>, ApiError> {
    let projects = state.db.projects().list_for_user(&user_id).await?;
    Ok(Json(projects.iter().map(|p| ProjectView::from_project(p, &state.config.terminal)).collect()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectCreatedView>), ApiError> {
    let created = state.orchestrator.create_project(&user_id, &body.display_name).await?;
    let view = ProjectCreatedView {
        project: ProjectView::from_project(&created.project, &state.config.terminal),
        ssh_private_key: created.project.ssh_private_key.clone(),
    };
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<ProjectView>, ApiError> {
    let project = state
        .db
        .projects()
        .find_by_id_for_user(&id, &user_id)
        .await?
        .ok_or_else(|| PomodexError::NotFound(id.clone()))?;
    Ok(Json(ProjectView::from_project(&project, &state.config.terminal)))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.orchestrator.delete_project(&id, &user_id).await?;
    Ok(StatusCode::OK)
}

pub async fn stop(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<ProjectView>, ApiError> {
    state.orchestrator.stop_project(&id, &user_id).await?;
    let project = state
        .db
        .projects()
        .find_by_id_for_user(&id, &user_id)
        .await?
        .ok_or_else(|| PomodexError::NotFound(id.clone()))?;
    Ok(Json(ProjectView::from_project(&project, &state.config.terminal)))
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<ProjectView>, ApiError> {
    state.orchestrator.start_project(&id, &user_id).await?;
    let project = state
        .db
        .projects()
        .find_by_id_for_user(&id, &user_id)
        .await?
        .ok_or_else(|| PomodexError::NotFound(id.clone()))?;
    Ok(Json(ProjectView::from_project(&project, &state.config.terminal)))
}

pub async fn backup_status(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = state
        .db
        .projects()
        .find_by_id_for_user(&id, &user_id)
        .await?
        .ok_or_else(|| PomodexError::NotFound(id.clone()))?;

    Ok(Json(json!({
        "last_backup_at": project.last_backup_at,
        "last_snapshot_at": project.last_snapshot_at,
        "snapshot_image_ref": project.snapshot_image_ref,
    })))
}
