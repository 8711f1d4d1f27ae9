// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session endpoints: register, login, refresh, logout, verify.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::{hash_password, verify_password, Auth, AuthError, AuthenticatedUser},
    error::ApiError,
    models::{
        LoginRequest, MessageResponse, PublicUser, RefreshRequest, RegisterRequest,
        SessionResponse,
    },
    state::AppState,
    storage::{StoredUser, UserRepository},
};

/// Origin label recorded in issued tokens for this API surface.
const TOKEN_ORIGIN: &str = "api";

const MIN_PASSWORD_LEN: usize = 8;

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    tag = "Auth",
    responses(
        (status = 201, body = SessionResponse),
        (status = 400, description = "Validation failure or handle/email taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let handle = request.handle.trim();
    let email = request.email.trim();
    if handle.is_empty() || email.is_empty() {
        return Err(ApiError::bad_request("handle and email are required"));
    }
    if !email.contains('@') {
        return Err(ApiError::bad_request("email address is not valid"));
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let now = Utc::now();
    let user = StoredUser {
        id: Uuid::new_v4().to_string(),
        handle: handle.to_string(),
        email: email.to_string(),
        password_hash: hash_password(&request.password)?,
        role: "user".to_string(),
        active: true,
        administrator: false,
        last_login_at: Some(now),
        created_at: now,
        updated_at: now,
    };
    UserRepository::new(&state.db).create(&user)?;

    let tokens = state
        .tokens
        .issue_pair(&user, TOKEN_ORIGIN, false, None, client_ip(&headers))?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            success: true,
            user: user.into(),
            tokens,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    tag = "Auth",
    responses(
        (status = 200, body = SessionResponse),
        (status = 401, description = "Bad credentials or inactive account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let users = UserRepository::new(&state.db);
    // The handle field doubles as an email for login convenience
    let user = match users.find_by_handle(&request.handle)? {
        Some(user) => Some(user),
        None => users.find_by_email(&request.handle)?,
    };

    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        // Same answer for unknown handle and wrong password
        _ => return Err(AuthError::BadCredentials.into()),
    };
    if !user.active {
        return Err(AuthError::UserInactive.into());
    }

    users.touch_last_login(&user.id, Utc::now())?;
    let tokens = state.tokens.issue_pair(
        &user,
        TOKEN_ORIGIN,
        request.remember,
        request.device,
        client_ip(&headers),
    )?;

    Ok(Json(SessionResponse {
        success: true,
        user: user.into(),
        tokens,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    tag = "Auth",
    responses(
        (status = 200, body = SessionResponse),
        (status = 401, description = "Invalid, expired, or already-used refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let tokens = state
        .tokens
        .refresh(&request.refresh_token, None, client_ip(&headers))
        .await?;

    // The rotation re-validated the user; fetch the profile for the response
    let claims_user = state.tokens.validate_access(&tokens.access_token).await?;
    let user = UserRepository::new(&state.db)
        .get(&claims_user.user_id)?
        .ok_or_else(|| ApiError::internal("user vanished during refresh"))?;

    Ok(Json(SessionResponse {
        success: true,
        user: user.into(),
        tokens,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Auth",
    security(("bearer" = [])),
    responses((status = 200, body = MessageResponse))
)]
pub async fn logout(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tokens.logout(&user).await?;
    // The 60 s validation cache would otherwise keep serving this token
    state.validation_cache.invalidate(&user.raw_token);
    Ok(Json(MessageResponse::ok("logged out")))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout-all",
    tag = "Auth",
    security(("bearer" = [])),
    responses((status = 200, body = MessageResponse))
)]
pub async fn logout_all(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let count = state.tokens.logout_all(&user.user_id, &user.user_id).await?;
    state.validation_cache.invalidate(&user.raw_token);
    Ok(Json(MessageResponse::ok(format!(
        "revoked {count} session token(s)"
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, body = AuthenticatedUser),
        (status = 401, description = "Token missing, invalid, or revoked")
    )
)]
pub async fn verify(Auth(user): Auth) -> Json<AuthenticatedUser> {
    Json(user)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::revocation::testing::MemoryRevocationList;
    use crate::auth::{TokenService, TokenTtls, ValidationCache};
    use crate::storage::Db;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    pub(crate) fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Db::open(&dir.path().join("test.redb")).unwrap());
        let tokens = Arc::new(TokenService::new(
            db.clone(),
            Arc::new(MemoryRevocationList::default()),
            b"access-secret",
            b"refresh-secret",
            TokenTtls::default(),
        ));
        let cache = Arc::new(ValidationCache::new(64, Duration::from_secs(60)));
        (AppState::new(db, tokens, cache), dir)
    }

    fn register_request(handle: &str) -> RegisterRequest {
        RegisterRequest {
            handle: handle.to_string(),
            email: format!("{handle}@example.com"),
            password: "hunter2-hunter2".to_string(),
        }
    }

    async fn register_user(state: &AppState, handle: &str) -> SessionResponse {
        let (status, Json(session)) = register(
            State(state.clone()),
            HeaderMap::new(),
            Json(register_request(handle)),
        )
        .await
        .expect("registration succeeds");
        assert_eq!(status, StatusCode::CREATED);
        session
    }

    #[tokio::test]
    async fn register_login_verify_logout_flow() {
        let (state, _dir) = test_state();
        register_user(&state, "alice").await;

        let Json(session) = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                handle: "alice".to_string(),
                password: "hunter2-hunter2".to_string(),
                remember: false,
                device: None,
            }),
        )
        .await
        .expect("login succeeds");
        assert!(session.success);
        assert_eq!(session.user.handle, "alice");

        let user = state
            .tokens
            .validate_access(&session.tokens.access_token)
            .await
            .expect("token is valid");

        logout(Auth(user), State(state.clone())).await.unwrap();

        let err = state
            .tokens
            .validate_access(&session.tokens.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn login_accepts_email_as_handle() {
        let (state, _dir) = test_state();
        register_user(&state, "alice").await;

        let result = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                handle: "alice@example.com".to_string(),
                password: "hunter2-hunter2".to_string(),
                remember: false,
                device: None,
            }),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let (state, _dir) = test_state();
        register_user(&state, "alice").await;

        let err = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                handle: "alice".to_string(),
                password: "wrong-password".to_string(),
                remember: false,
                device: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_rejects_inactive_account() {
        let (state, _dir) = test_state();
        let session = register_user(&state, "alice").await;
        UserRepository::new(&state.db)
            .set_active(&session.user.id, false)
            .unwrap();

        let err = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                handle: "alice".to_string(),
                password: "hunter2-hunter2".to_string(),
                remember: false,
                device: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "user_inactive");
    }

    #[tokio::test]
    async fn register_rejects_duplicate_handle() {
        let (state, _dir) = test_state();
        register_user(&state, "alice").await;

        let mut dup = register_request("alice");
        dup.email = "other@example.com".to_string();
        let err = register(State(state.clone()), HeaderMap::new(), Json(dup))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let (state, _dir) = test_state();
        let mut req = register_request("alice");
        req.password = "short".to_string();
        let err = register(State(state.clone()), HeaderMap::new(), Json(req))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let (state, _dir) = test_state();
        let session = register_user(&state, "alice").await;

        let Json(rotated) = refresh(
            State(state.clone()),
            HeaderMap::new(),
            Json(RefreshRequest {
                refresh_token: session.tokens.refresh_token.clone(),
            }),
        )
        .await
        .expect("refresh succeeds");
        assert_ne!(rotated.tokens.refresh_token, session.tokens.refresh_token);

        // Reuse of the consumed refresh token is rejected
        let err = refresh(
            State(state.clone()),
            HeaderMap::new(),
            Json(RefreshRequest {
                refresh_token: session.tokens.refresh_token,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_all_kills_other_sessions() {
        let (state, _dir) = test_state();
        let first = register_user(&state, "alice").await;

        let Json(second) = login(
            State(state.clone()),
            HeaderMap::new(),
            Json(LoginRequest {
                handle: "alice".to_string(),
                password: "hunter2-hunter2".to_string(),
                remember: false,
                device: Some("laptop".to_string()),
            }),
        )
        .await
        .unwrap();

        let user = state
            .tokens
            .validate_access(&second.tokens.access_token)
            .await
            .unwrap();
        logout_all(Auth(user), State(state.clone())).await.unwrap();

        for token in [&first.tokens.refresh_token, &second.tokens.refresh_token] {
            let err = refresh(
                State(state.clone()),
                HeaderMap::new(),
                Json(RefreshRequest {
                    refresh_token: token.clone(),
                }),
            )
            .await
            .unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        }
    }
}
