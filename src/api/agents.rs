// SPDX-License-Identifier: AGPL-3.0-or-later

//! Monitoring agent endpoints: registration, check-in, configuration,
//! metric ingestion, and alerts.
//!
//! Agents do not hold JWTs. They authenticate every request with their UUID
//! path parameter plus the shared-secret bearer token minted at
//! registration. User-facing reads use the normal JWT extractors, limited
//! to admins and the agent's owner.

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::{AdminOnly, Auth, AuthError, AuthenticatedUser},
    error::ApiError,
    models::{
        AgentCheckinRequest, ChangeAlertStatusRequest, CreateAlertRequest, RegisterAgentRequest,
        RegisterAgentResponse,
    },
    state::AppState,
    storage::{
        AgentConfig, AgentRepository, AgentStatus, AlertRepository, AlertStatus, MetricRecord,
        StoredAgent, StoredAlert,
    },
};

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AuthError::InvalidAuthHeader.into())
}

/// Authenticate an agent request by UUID + shared secret.
///
/// Unknown UUID and wrong secret produce the same 401.
fn authenticate_agent(
    state: &AppState,
    uuid: &str,
    headers: &HeaderMap,
) -> Result<StoredAgent, ApiError> {
    let token = bearer_token(headers)?;
    AgentRepository::new(&state.db)
        .authenticate(uuid, token)?
        .ok_or_else(|| AuthError::BadCredentials.into())
}

fn can_view_agent(user: &AuthenticatedUser, agent: &StoredAgent) -> bool {
    user.is_admin() || agent.owner_user_id.as_deref() == Some(user.user_id.as_str())
}

fn fetch_visible_agent(
    state: &AppState,
    user: &AuthenticatedUser,
    uuid: &str,
) -> Result<StoredAgent, ApiError> {
    let agent = AgentRepository::new(&state.db)
        .get(uuid)?
        .ok_or_else(|| ApiError::not_found(format!("agent {uuid} not found")))?;
    if !can_view_agent(user, &agent) {
        return Err(ApiError::not_found(format!("agent {uuid} not found")));
    }
    Ok(agent)
}

#[utoipa::path(
    post,
    path = "/api/v1/agents",
    request_body = RegisterAgentRequest,
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 201, body = RegisterAgentResponse), (status = 403))
)]
pub async fn register_agent(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<RegisterAgentResponse>), ApiError> {
    let agent = StoredAgent {
        uuid: Uuid::new_v4().to_string(),
        // The secret is only ever returned from this endpoint
        token: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
        owner_user_id: request.owner_user_id.or(Some(admin.user_id)),
        status: AgentStatus::Inactive,
        last_checkin_at: None,
        version: request.version,
        ip: None,
        created_at: Utc::now(),
    };
    AgentRepository::new(&state.db).create(&agent)?;

    tracing::info!(agent = %agent.uuid, "Registered monitoring agent");
    Ok((
        StatusCode::CREATED,
        Json(RegisterAgentResponse {
            success: true,
            uuid: agent.uuid,
            token: agent.token,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/agents",
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 200, body = [StoredAgent]), (status = 403))
)]
pub async fn list_agents(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredAgent>>, ApiError> {
    let mut agents = AgentRepository::new(&state.db).list_all()?;
    // Registration secrets stay out of list responses
    for agent in &mut agents {
        agent.token = String::new();
    }
    Ok(Json(agents))
}

#[utoipa::path(
    get,
    path = "/api/v1/agents/{uuid}",
    params(("uuid" = String, Path, description = "Agent UUID")),
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 200, body = StoredAgent), (status = 404))
)]
pub async fn get_agent(
    Auth(user): Auth,
    Path(uuid): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StoredAgent>, ApiError> {
    let mut agent = fetch_visible_agent(&state, &user, &uuid)?;
    agent.token = String::new();
    Ok(Json(agent))
}

#[utoipa::path(
    post,
    path = "/api/v1/agents/{uuid}/checkin",
    params(("uuid" = String, Path, description = "Agent UUID")),
    request_body = AgentCheckinRequest,
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 200, body = AgentConfig), (status = 401))
)]
pub async fn checkin(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AgentCheckinRequest>,
) -> Result<Json<AgentConfig>, ApiError> {
    authenticate_agent(&state, &uuid, &headers)?;

    let agents = AgentRepository::new(&state.db);
    agents.check_in(&uuid, AgentStatus::Active, request.version, request.ip)?;

    // Check-ins double as config polls
    Ok(Json(agents.get_config(&uuid)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/agents/{uuid}/config",
    params(("uuid" = String, Path, description = "Agent UUID")),
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 200, body = AgentConfig), (status = 401))
)]
pub async fn get_config(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AgentConfig>, ApiError> {
    // Accept either the agent's shared secret or an authorized user token
    if authenticate_agent(&state, &uuid, &headers).is_err() {
        let token = bearer_token(&headers)?;
        let user = state.tokens.validate_access(token).await?;
        fetch_visible_agent(&state, &user, &uuid)?;
    }
    Ok(Json(AgentRepository::new(&state.db).get_config(&uuid)?))
}

#[utoipa::path(
    put,
    path = "/api/v1/agents/{uuid}/config",
    params(("uuid" = String, Path, description = "Agent UUID")),
    request_body = AgentConfig,
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 200, body = AgentConfig), (status = 404))
)]
pub async fn put_config(
    AdminOnly(_admin): AdminOnly,
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    Json(config): Json<AgentConfig>,
) -> Result<Json<AgentConfig>, ApiError> {
    let agents = AgentRepository::new(&state.db);
    if agents.get(&uuid)?.is_none() {
        return Err(ApiError::not_found(format!("agent {uuid} not found")));
    }
    agents.put_config(&uuid, &config)?;
    Ok(Json(config))
}

#[utoipa::path(
    post,
    path = "/api/v1/agents/{uuid}/metrics",
    params(("uuid" = String, Path, description = "Agent UUID")),
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 201, body = MetricRecord), (status = 401))
)]
pub async fn submit_metrics(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(metrics): Json<Value>,
) -> Result<(StatusCode, Json<MetricRecord>), ApiError> {
    authenticate_agent(&state, &uuid, &headers)?;

    let record = MetricRecord {
        id: Uuid::new_v4().to_string(),
        agent_uuid: uuid,
        metrics,
        recorded_at: Utc::now(),
    };
    AgentRepository::new(&state.db).insert_metrics(&record)?;

    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MetricsQuery {
    /// Maximum number of records, newest first
    #[serde(default = "default_metrics_limit")]
    pub limit: usize,
}

fn default_metrics_limit() -> usize {
    100
}

#[utoipa::path(
    get,
    path = "/api/v1/agents/{uuid}/metrics",
    params(
        ("uuid" = String, Path, description = "Agent UUID"),
        MetricsQuery
    ),
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 200, body = [MetricRecord]), (status = 404))
)]
pub async fn list_metrics(
    Auth(user): Auth,
    Path(uuid): Path<String>,
    Query(query): Query<MetricsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<MetricRecord>>, ApiError> {
    fetch_visible_agent(&state, &user, &uuid)?;
    Ok(Json(
        AgentRepository::new(&state.db).list_metrics(&uuid, query.limit)?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/agents/{uuid}/alerts",
    params(("uuid" = String, Path, description = "Agent UUID")),
    request_body = CreateAlertRequest,
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 201, body = StoredAlert), (status = 401))
)]
pub async fn raise_alert(
    Path(uuid): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<StoredAlert>), ApiError> {
    authenticate_agent(&state, &uuid, &headers)?;

    let now = Utc::now();
    let alert = StoredAlert {
        id: Uuid::new_v4().to_string(),
        agent_uuid: uuid,
        service: request.service,
        severity: request.severity,
        status: AlertStatus::Active,
        message: request.message,
        metadata: request.metadata.unwrap_or(Value::Null),
        tags: request.tags,
        last_notified_at: None,
        notification_interval_secs: request.notification_interval_secs,
        created_at: now,
        updated_at: now,
    };
    AlertRepository::new(&state.db).create(&alert)?;

    tracing::info!(
        agent = %alert.agent_uuid,
        severity = ?alert.severity,
        "Alert raised"
    );
    Ok((StatusCode::CREATED, Json(alert)))
}

#[utoipa::path(
    get,
    path = "/api/v1/agents/{uuid}/alerts",
    params(("uuid" = String, Path, description = "Agent UUID")),
    tag = "Agents",
    security(("bearer" = [])),
    responses((status = 200, body = [StoredAlert]), (status = 404))
)]
pub async fn list_alerts(
    Auth(user): Auth,
    Path(uuid): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredAlert>>, ApiError> {
    fetch_visible_agent(&state, &user, &uuid)?;
    Ok(Json(AlertRepository::new(&state.db).list_by_agent(&uuid)?))
}

#[utoipa::path(
    put,
    path = "/api/v1/alerts/{alert_id}/status",
    params(("alert_id" = String, Path, description = "Alert identifier")),
    request_body = ChangeAlertStatusRequest,
    tag = "Agents",
    security(("bearer" = [])),
    responses(
        (status = 200, body = StoredAlert),
        (status = 400, description = "Illegal status transition"),
        (status = 404)
    )
)]
pub async fn change_alert_status(
    Auth(user): Auth,
    Path(alert_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ChangeAlertStatusRequest>,
) -> Result<Json<StoredAlert>, ApiError> {
    let alerts = AlertRepository::new(&state.db);
    let alert = alerts
        .get(&alert_id)?
        .ok_or_else(|| ApiError::not_found(format!("alert {alert_id} not found")))?;
    fetch_visible_agent(&state, &user, &alert.agent_uuid)?;

    Ok(Json(alerts.update_status(&alert_id, request.status)?))
}
