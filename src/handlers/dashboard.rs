// src/handlers/dashboard.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    common::{error::AppError, payload::Payload},
    config::AppState,
    middleware::i18n::Locale,
    models::dashboard::{DashboardGoal, DashboardReport, GoalForm, Period},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// monthly | quarterly | yearly (outros valores viram monthly)
    pub period: Option<String>,
}

// GET /api/dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Métricas do período, progresso das metas e itens destacados", body = DashboardReport),
        (status = 401, description = "Não autorizado")
    ),
    security(
        ("api_jwt" = [])
    )
)]
pub async fn get_report(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, AppError> {
    let period = Period::from_query(query.period.as_deref());
    let report = app_state.dashboard_service.report(period, locale.lang()).await?;

    Ok((StatusCode::OK, Json(report)))
}

// PUT /api/dashboard/goals/{period}
#[utoipa::path(
    put,
    path = "/api/dashboard/goals/{period}",
    tag = "Dashboard",
    params(("period" = String, Path, description = "monthly | quarterly | yearly")),
    request_body = GoalForm,
    responses(
        (status = 200, description = "Meta atualizada", body = DashboardGoal),
        (status = 400, description = "Meta negativa"),
        (status = 404, description = "Período desconhecido")
    ),
    security(
        ("api_jwt" = [])
    )
)]
pub async fn update_goal(
    State(app_state): State<AppState>,
    Path(period): Path<String>,
    Payload(form): Payload<GoalForm>,
) -> Result<impl IntoResponse, AppError> {
    // Aqui o período vem da rota: desconhecido é 404, não fallback
    let period = Period::from_code(&period).ok_or(AppError::NotFound("Período"))?;
    form.validate()?;

    let goal = app_state.dashboard_service.update_goal(period, &form).await?;
    Ok((StatusCode::OK, Json(goal)))
}
