// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP API: versioned router, middleware stack, and OpenAPI document.
//!
//! All business endpoints live under `/api/v1`; health probes and the
//! Swagger UI are mounted at the root.

use axum::{
    http::HeaderName,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{claims::AuthenticatedUser, roles::Role, tokens::IssuedTokens},
    models::{
        AgentCheckinRequest, ChangeAlertStatusRequest, ChangePasswordRequest,
        ChangeTicketStatusRequest, CreateAlertRequest, CreateCommentRequest, CreateGroupRequest,
        CreateReportRequest, CreateTicketRequest, EscalateTicketRequest, LoginRequest,
        MessageResponse, PublicUser, RefreshRequest, RegisterAgentRequest, RegisterAgentResponse,
        RegisterRequest, SessionResponse, SetActiveRequest, UpdateGroupRequest,
        UpdateProfileRequest, UpdateTicketRequest,
    },
    state::AppState,
    storage::{
        AgentConfig, AgentStatus, AlertSeverity, AlertStatus, MetricRecord, ReportKind,
        StoredAgent, StoredAlert, StoredGroup, StoredReport, StoredTicket, TicketComment,
        TicketEscalation, TicketHistoryEntry, TicketPriority, TicketStatus,
    },
};

pub mod agents;
pub mod auth;
pub mod groups;
pub mod health;
pub mod reports;
pub mod tickets;
pub mod users;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout-all", post(auth::logout_all))
        .route("/auth/verify", get(auth::verify))
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::me).put(users::update_me))
        .route("/users/me/password", put(users::change_password))
        .route("/users/{user_id}", get(users::get_user))
        .route("/users/{user_id}/active", put(users::set_user_active))
        .route(
            "/groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route(
            "/groups/{group_id}",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        .route("/groups/{group_id}/members", get(groups::list_members))
        .route(
            "/groups/{group_id}/members/{user_id}",
            post(groups::add_member).delete(groups::remove_member),
        )
        .route(
            "/tickets",
            get(tickets::list_tickets).post(tickets::create_ticket),
        )
        .route(
            "/tickets/{ticket_id}",
            get(tickets::get_ticket).put(tickets::update_ticket),
        )
        .route("/tickets/{ticket_id}/status", put(tickets::change_status))
        .route(
            "/tickets/{ticket_id}/comments",
            get(tickets::list_comments).post(tickets::add_comment),
        )
        .route("/tickets/{ticket_id}/history", get(tickets::list_history))
        .route(
            "/tickets/{ticket_id}/escalate",
            post(tickets::escalate_ticket),
        )
        .route(
            "/tickets/{ticket_id}/escalations",
            get(tickets::list_escalations),
        )
        .route(
            "/agents",
            get(agents::list_agents).post(agents::register_agent),
        )
        .route("/agents/{uuid}", get(agents::get_agent))
        .route("/agents/{uuid}/checkin", post(agents::checkin))
        .route(
            "/agents/{uuid}/config",
            get(agents::get_config).put(agents::put_config),
        )
        .route(
            "/agents/{uuid}/metrics",
            get(agents::list_metrics).post(agents::submit_metrics),
        )
        .route(
            "/agents/{uuid}/alerts",
            get(agents::list_alerts).post(agents::raise_alert),
        )
        .route(
            "/alerts/{alert_id}/status",
            put(agents::change_alert_status),
        )
        .route(
            "/reports",
            get(reports::list_reports).post(reports::submit_report),
        )
        .route("/reports/{report_id}", get(reports::get_report));

    Router::new()
        .nest("/api/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::error::expose_internal_detail,
        ))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::logout_all,
        auth::verify,
        users::me,
        users::update_me,
        users::change_password,
        users::list_users,
        users::get_user,
        users::set_user_active,
        groups::list_groups,
        groups::create_group,
        groups::get_group,
        groups::update_group,
        groups::delete_group,
        groups::list_members,
        groups::add_member,
        groups::remove_member,
        tickets::list_tickets,
        tickets::create_ticket,
        tickets::get_ticket,
        tickets::update_ticket,
        tickets::change_status,
        tickets::add_comment,
        tickets::list_comments,
        tickets::list_history,
        tickets::escalate_ticket,
        tickets::list_escalations,
        agents::register_agent,
        agents::list_agents,
        agents::get_agent,
        agents::checkin,
        agents::get_config,
        agents::put_config,
        agents::submit_metrics,
        agents::list_metrics,
        agents::raise_alert,
        agents::list_alerts,
        agents::change_alert_status,
        reports::submit_report,
        reports::list_reports,
        reports::get_report,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            AuthenticatedUser,
            IssuedTokens,
            Role,
            MessageResponse,
            PublicUser,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            SessionResponse,
            UpdateProfileRequest,
            ChangePasswordRequest,
            SetActiveRequest,
            CreateGroupRequest,
            UpdateGroupRequest,
            StoredGroup,
            CreateTicketRequest,
            UpdateTicketRequest,
            ChangeTicketStatusRequest,
            CreateCommentRequest,
            EscalateTicketRequest,
            StoredTicket,
            TicketStatus,
            TicketPriority,
            TicketComment,
            TicketHistoryEntry,
            TicketEscalation,
            RegisterAgentRequest,
            RegisterAgentResponse,
            AgentCheckinRequest,
            StoredAgent,
            AgentStatus,
            AgentConfig,
            MetricRecord,
            CreateAlertRequest,
            ChangeAlertStatusRequest,
            StoredAlert,
            AlertSeverity,
            AlertStatus,
            CreateReportRequest,
            StoredReport,
            ReportKind,
            health::HealthResponse,
            health::HealthChecks,
            health::ReadyResponse
        )
    ),
    tags(
        (name = "Auth", description = "Session lifecycle: register, login, refresh, logout"),
        (name = "Users", description = "Profiles and admin account management"),
        (name = "Groups", description = "Groups and membership"),
        (name = "Tickets", description = "Helpdesk tickets, comments, escalations"),
        (name = "Agents", description = "Monitoring agents, metrics, alerts"),
        (name = "Reports", description = "Bug and debug reports"),
        (name = "Health", description = "Probes")
    )
)]
struct ApiDoc;
