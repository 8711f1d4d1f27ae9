// SPDX-License-Identifier: AGPL-3.0-or-later

//! API error envelope.
//!
//! Every failing response carries the same JSON shape:
//! `{"success": false, "message": "...", "error": "<code>"}`.
//! Internal error detail is logged server-side and never serialized into
//! the body directly; [`expose_internal_detail`] swaps it in when the
//! injected [`AppState::development`] flag is set.
//!
//! [`AppState::development`]: crate::state::AppState

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::state::AppState;
use crate::storage::StoreError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: &'static str,
    /// Server-side detail for internal errors; surfaced to clients only in
    /// development mode.
    pub detail: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    error: &'static str,
}

/// Response-extension carrier for suppressed internal detail.
#[derive(Clone)]
struct InternalDetail(String);

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            detail: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "conflict", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    /// Internal error. Full detail is logged and kept out of the body; the
    /// client sees a generic message unless the development middleware
    /// exposes the detail.
    pub fn internal(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(detail, "Internal error");
        let mut error = Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        );
        error.detail = Some(detail);
        error
    }
}

impl From<crate::auth::AuthError> for ApiError {
    fn from(e: crate::auth::AuthError) -> Self {
        Self::new(e.status_code(), e.error_code(), e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::not_found(format!("{what} not found")),
            StoreError::AlreadyExists(what) => Self::conflict(format!("{what} already exists")),
            StoreError::Conflict(msg) => Self::conflict(msg),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            message: self.message,
            error: self.code,
        });
        let mut response = (self.status, body).into_response();
        if let Some(detail) = self.detail {
            response.extensions_mut().insert(InternalDetail(detail));
        }
        response
    }
}

/// Middleware that rewrites internal error responses to carry their full
/// detail when [`AppState::development`] is set. Outside development the
/// detail stays in the extension and is dropped with the response.
pub async fn expose_internal_detail(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    if !state.development {
        return response;
    }
    let Some(InternalDetail(detail)) = response.extensions_mut().remove::<InternalDetail>() else {
        return response;
    };

    let status = response.status();
    let body = Json(ErrorBody {
        success: false,
        message: detail,
        error: "internal_error",
    });
    (status, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, body::Body, http::Request as HttpRequest, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");
        assert_eq!(nf.code, "not_found");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);

        let forbidden = ApiError::forbidden("no");
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn store_errors_map_to_status() {
        let nf: ApiError = StoreError::NotFound("ticket t-1".to_string()).into();
        assert_eq!(nf.status, StatusCode::NOT_FOUND);

        let dup: ApiError = StoreError::AlreadyExists("handle alice".to_string()).into();
        assert_eq!(dup.status, StatusCode::BAD_REQUEST);

        let conflict: ApiError =
            StoreError::Conflict("illegal status transition".to_string()).into();
        assert_eq!(conflict.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn into_response_returns_envelope() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "bad data");
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn internal_detail_never_lands_in_the_body() {
        let response = ApiError::internal("db exploded").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["message"], "Internal server error");
    }

    fn router_with(development: bool) -> (Router, tempfile::TempDir) {
        let (state, dir) = crate::api::auth::tests::test_state();
        let state = state.with_development(development);
        let app = Router::new()
            .route("/boom", get(|| async { ApiError::internal("db exploded") }))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                expose_internal_detail,
            ))
            .with_state(state);
        (app, dir)
    }

    async fn boom_message(app: Router) -> serde_json::Value {
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/boom")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body_bytes).unwrap()
    }

    #[tokio::test]
    async fn development_mode_exposes_internal_detail() {
        let (app, _dir) = router_with(true);
        let body = boom_message(app).await;
        assert_eq!(body["message"], "db exploded");
        assert_eq!(body["error"], "internal_error");
    }

    #[tokio::test]
    async fn production_mode_keeps_detail_suppressed() {
        let (app, _dir) = router_with(false);
        let body = boom_message(app).await;
        assert_eq!(body["message"], "Internal server error");
    }
}
