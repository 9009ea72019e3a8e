// src/handlers/activity.rs

use axum::{extract::State, Json};

use crate::{common::error::AppError, config::AppState, models::activity::ActivityEntry};

// GET /api/activity
#[utoipa::path(
    get,
    path = "/api/activity",
    tag = "Activity",
    responses(
        (status = 200, description = "As 15 ações mais recentes, da mais nova para a mais antiga", body = Vec<ActivityEntry>)
    ),
    security(("api_jwt" = []))
)]
pub async fn recent_activity(State(app_state): State<AppState>) -> Result<Json<Vec<ActivityEntry>>, AppError> {
    Ok(Json(app_state.activity_repo.recent().await?))
}
