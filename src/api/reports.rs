// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bug and debug report endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    models::CreateReportRequest,
    state::AppState,
    storage::{ReportKind, ReportRepository, StoredReport},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReportQuery {
    /// Restrict to one kind (`bug` or `debug`)
    #[serde(default)]
    pub kind: Option<ReportKind>,
}

#[utoipa::path(
    post,
    path = "/api/v1/reports",
    request_body = CreateReportRequest,
    tag = "Reports",
    security(("bearer" = [])),
    responses((status = 201, body = StoredReport), (status = 400))
)]
pub async fn submit_report(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<StoredReport>), ApiError> {
    if request.summary.trim().is_empty() {
        return Err(ApiError::bad_request("summary is required"));
    }

    let report = StoredReport {
        id: Uuid::new_v4().to_string(),
        kind: request.kind,
        reporter_user_id: user.user_id,
        summary: request.summary.trim().to_string(),
        detail: request.detail,
        created_at: Utc::now(),
    };
    ReportRepository::new(&state.db).create(&report)?;

    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports",
    params(ReportQuery),
    tag = "Reports",
    security(("bearer" = [])),
    responses((status = 200, body = [StoredReport]), (status = 403))
)]
pub async fn list_reports(
    AdminOnly(_admin): AdminOnly,
    Query(query): Query<ReportQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredReport>>, ApiError> {
    Ok(Json(ReportRepository::new(&state.db).list(query.kind)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/{report_id}",
    params(("report_id" = String, Path, description = "Report identifier")),
    tag = "Reports",
    security(("bearer" = [])),
    responses((status = 200, body = StoredReport), (status = 404))
)]
pub async fn get_report(
    AdminOnly(_admin): AdminOnly,
    Path(report_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StoredReport>, ApiError> {
    let report = ReportRepository::new(&state.db)
        .get(&report_id)?
        .ok_or_else(|| ApiError::not_found(format!("report {report_id} not found")))?;
    Ok(Json(report))
}
