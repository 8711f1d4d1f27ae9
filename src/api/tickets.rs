// SPDX-License-Identifier: AGPL-3.0-or-later

//! Helpdesk ticket endpoints.
//!
//! Non-admin users only see tickets they created or are assigned to.
//! Status transitions, escalations, and their history entries are written
//! in a single storage transaction.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::{Auth, AuthenticatedUser},
    error::ApiError,
    models::{
        ChangeTicketStatusRequest, CreateCommentRequest, CreateTicketRequest,
        EscalateTicketRequest, UpdateTicketRequest,
    },
    state::AppState,
    storage::{
        StoredTicket, TicketComment, TicketEscalation, TicketHistoryEntry, TicketPriority,
        TicketRepository, TicketStatus,
    },
};

fn can_view(user: &AuthenticatedUser, ticket: &StoredTicket) -> bool {
    user.is_admin()
        || ticket.creator_user_id == user.user_id
        || ticket.assignee_user_id.as_deref() == Some(user.user_id.as_str())
}

fn fetch_visible(
    state: &AppState,
    user: &AuthenticatedUser,
    ticket_id: &str,
) -> Result<StoredTicket, ApiError> {
    let ticket = TicketRepository::new(&state.db)
        .get(ticket_id)?
        .ok_or_else(|| ApiError::not_found(format!("ticket {ticket_id} not found")))?;
    if !can_view(user, &ticket) {
        // Hidden tickets read as absent
        return Err(ApiError::not_found(format!("ticket {ticket_id} not found")));
    }
    Ok(ticket)
}

#[utoipa::path(
    get,
    path = "/api/v1/tickets",
    tag = "Tickets",
    security(("bearer" = [])),
    responses((status = 200, body = [StoredTicket]))
)]
pub async fn list_tickets(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredTicket>>, ApiError> {
    let all = TicketRepository::new(&state.db).list_all()?;
    let visible = all
        .into_iter()
        .filter(|t| can_view(&user, t))
        .collect::<Vec<_>>();
    Ok(Json(visible))
}

#[utoipa::path(
    post,
    path = "/api/v1/tickets",
    request_body = CreateTicketRequest,
    tag = "Tickets",
    security(("bearer" = [])),
    responses((status = 201, body = StoredTicket), (status = 400))
)]
pub async fn create_ticket(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<StoredTicket>), ApiError> {
    if request.subject.trim().is_empty() {
        return Err(ApiError::bad_request("subject is required"));
    }

    let now = Utc::now();
    let ticket = StoredTicket {
        id: Uuid::new_v4().to_string(),
        subject: request.subject.trim().to_string(),
        body: request.body,
        status: TicketStatus::Open,
        priority: request.priority.unwrap_or(TicketPriority::Medium),
        creator_user_id: user.user_id.clone(),
        assignee_user_id: request.assignee_user_id,
        category: request.category,
        comment_seq: 0,
        history_seq: 0,
        escalation_seq: 0,
        created_at: now,
        updated_at: now,
    };
    TicketRepository::new(&state.db).create(&ticket)?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tickets/{ticket_id}",
    params(("ticket_id" = String, Path, description = "Ticket identifier")),
    tag = "Tickets",
    security(("bearer" = [])),
    responses((status = 200, body = StoredTicket), (status = 404))
)]
pub async fn get_ticket(
    Auth(user): Auth,
    Path(ticket_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StoredTicket>, ApiError> {
    Ok(Json(fetch_visible(&state, &user, &ticket_id)?))
}

#[utoipa::path(
    put,
    path = "/api/v1/tickets/{ticket_id}",
    params(("ticket_id" = String, Path, description = "Ticket identifier")),
    request_body = UpdateTicketRequest,
    tag = "Tickets",
    security(("bearer" = [])),
    responses((status = 200, body = StoredTicket), (status = 404))
)]
pub async fn update_ticket(
    Auth(user): Auth,
    Path(ticket_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<UpdateTicketRequest>,
) -> Result<Json<StoredTicket>, ApiError> {
    let mut ticket = fetch_visible(&state, &user, &ticket_id)?;

    if let Some(subject) = request.subject {
        if subject.trim().is_empty() {
            return Err(ApiError::bad_request("subject cannot be empty"));
        }
        ticket.subject = subject.trim().to_string();
    }
    if let Some(body) = request.body {
        ticket.body = body;
    }
    if let Some(priority) = request.priority {
        ticket.priority = priority;
    }
    if let Some(category) = request.category {
        ticket.category = Some(category);
    }
    if let Some(assignee) = request.assignee_user_id {
        ticket.assignee_user_id = Some(assignee);
    }
    ticket.updated_at = Utc::now();
    TicketRepository::new(&state.db).update(&ticket)?;

    Ok(Json(ticket))
}

#[utoipa::path(
    put,
    path = "/api/v1/tickets/{ticket_id}/status",
    params(("ticket_id" = String, Path, description = "Ticket identifier")),
    request_body = ChangeTicketStatusRequest,
    tag = "Tickets",
    security(("bearer" = [])),
    responses(
        (status = 200, body = StoredTicket),
        (status = 400, description = "Illegal status transition"),
        (status = 404)
    )
)]
pub async fn change_status(
    Auth(user): Auth,
    Path(ticket_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ChangeTicketStatusRequest>,
) -> Result<Json<StoredTicket>, ApiError> {
    fetch_visible(&state, &user, &ticket_id)?;

    let ticket = TicketRepository::new(&state.db).change_status(
        &ticket_id,
        request.status,
        &user.user_id,
        request.note,
        request.comment,
    )?;
    Ok(Json(ticket))
}

#[utoipa::path(
    post,
    path = "/api/v1/tickets/{ticket_id}/comments",
    params(("ticket_id" = String, Path, description = "Ticket identifier")),
    request_body = CreateCommentRequest,
    tag = "Tickets",
    security(("bearer" = [])),
    responses((status = 201, body = TicketComment), (status = 404))
)]
pub async fn add_comment(
    Auth(user): Auth,
    Path(ticket_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<TicketComment>), ApiError> {
    if request.body.trim().is_empty() {
        return Err(ApiError::bad_request("comment body is required"));
    }
    fetch_visible(&state, &user, &ticket_id)?;

    let comment =
        TicketRepository::new(&state.db).add_comment(&ticket_id, &user.user_id, request.body)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tickets/{ticket_id}/comments",
    params(("ticket_id" = String, Path, description = "Ticket identifier")),
    tag = "Tickets",
    security(("bearer" = [])),
    responses((status = 200, body = [TicketComment]), (status = 404))
)]
pub async fn list_comments(
    Auth(user): Auth,
    Path(ticket_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TicketComment>>, ApiError> {
    fetch_visible(&state, &user, &ticket_id)?;
    Ok(Json(TicketRepository::new(&state.db).list_comments(&ticket_id)?))
}

#[utoipa::path(
    get,
    path = "/api/v1/tickets/{ticket_id}/history",
    params(("ticket_id" = String, Path, description = "Ticket identifier")),
    tag = "Tickets",
    security(("bearer" = [])),
    responses((status = 200, body = [TicketHistoryEntry]), (status = 404))
)]
pub async fn list_history(
    Auth(user): Auth,
    Path(ticket_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TicketHistoryEntry>>, ApiError> {
    fetch_visible(&state, &user, &ticket_id)?;
    Ok(Json(TicketRepository::new(&state.db).list_history(&ticket_id)?))
}

#[utoipa::path(
    post,
    path = "/api/v1/tickets/{ticket_id}/escalate",
    params(("ticket_id" = String, Path, description = "Ticket identifier")),
    request_body = EscalateTicketRequest,
    tag = "Tickets",
    security(("bearer" = [])),
    responses(
        (status = 200, body = StoredTicket),
        (status = 400, description = "Ticket cannot be escalated from its current status"),
        (status = 404)
    )
)]
pub async fn escalate_ticket(
    Auth(user): Auth,
    Path(ticket_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<EscalateTicketRequest>,
) -> Result<Json<StoredTicket>, ApiError> {
    if request.reason.trim().is_empty() {
        return Err(ApiError::bad_request("escalation reason is required"));
    }
    fetch_visible(&state, &user, &ticket_id)?;

    let ticket =
        TicketRepository::new(&state.db).escalate(&ticket_id, &user.user_id, request.reason)?;
    Ok(Json(ticket))
}

#[utoipa::path(
    get,
    path = "/api/v1/tickets/{ticket_id}/escalations",
    params(("ticket_id" = String, Path, description = "Ticket identifier")),
    tag = "Tickets",
    security(("bearer" = [])),
    responses((status = 200, body = [TicketEscalation]), (status = 404))
)]
pub async fn list_escalations(
    Auth(user): Auth,
    Path(ticket_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TicketEscalation>>, ApiError> {
    fetch_visible(&state, &user, &ticket_id)?;
    Ok(Json(
        TicketRepository::new(&state.db).list_escalations(&ticket_id)?,
    ))
}
