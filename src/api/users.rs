// SPDX-License-Identifier: AGPL-3.0-or-later

//! User profile and admin account management endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use crate::{
    auth::{hash_password, verify_password, AdminOnly, Auth, AuthError},
    error::ApiError,
    models::{
        ChangePasswordRequest, MessageResponse, PublicUser, SetActiveRequest,
        UpdateProfileRequest,
    },
    state::AppState,
    storage::UserRepository,
};

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = PublicUser))
)]
pub async fn me(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, ApiError> {
    let stored = UserRepository::new(&state.db)
        .get(&user.user_id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(stored.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    request_body = UpdateProfileRequest,
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = PublicUser))
)]
pub async fn update_me(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let users = UserRepository::new(&state.db);
    let mut stored = users
        .get(&user.user_id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    if let Some(email) = request.email {
        let email = email.trim().to_string();
        if !email.contains('@') {
            return Err(ApiError::bad_request("email address is not valid"));
        }
        if email != stored.email {
            if users.find_by_email(&email)?.is_some() {
                return Err(ApiError::conflict(format!("email {email} already exists")));
            }
            stored.email = email;
        }
    }
    stored.updated_at = Utc::now();
    users.update(&stored)?;

    Ok(Json(stored.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me/password",
    request_body = ChangePasswordRequest,
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, body = MessageResponse),
        (status = 401, description = "Current password does not match")
    )
)]
pub async fn change_password(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if request.new_password.len() < 8 {
        return Err(ApiError::bad_request(
            "password must be at least 8 characters",
        ));
    }

    let users = UserRepository::new(&state.db);
    let stored = users
        .get(&user.user_id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    if !verify_password(&request.current_password, &stored.password_hash) {
        return Err(AuthError::BadCredentials.into());
    }

    users.set_password_hash(&user.user_id, &hash_password(&request.new_password)?)?;

    // Every other session dies with the old password
    state.tokens.logout_all(&user.user_id, &user.user_id).await?;
    state.validation_cache.invalidate(&user.raw_token);

    Ok(Json(MessageResponse::ok(
        "password changed; all sessions revoked",
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = [PublicUser]), (status = 403))
)]
pub async fn list_users(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = UserRepository::new(&state.db).list_all()?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    params(("user_id" = String, Path, description = "User identifier")),
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = PublicUser), (status = 404))
)]
pub async fn get_user(
    AdminOnly(_admin): AdminOnly,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, ApiError> {
    let stored = UserRepository::new(&state.db)
        .get(&user_id)?
        .ok_or_else(|| ApiError::not_found(format!("user {user_id} not found")))?;
    Ok(Json(stored.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/active",
    params(("user_id" = String, Path, description = "User identifier")),
    request_body = SetActiveRequest,
    tag = "Users",
    security(("bearer" = [])),
    responses((status = 200, body = MessageResponse), (status = 404))
)]
pub async fn set_user_active(
    AdminOnly(admin): AdminOnly,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let users = UserRepository::new(&state.db);
    if users.get(&user_id)?.is_none() {
        return Err(ApiError::not_found(format!("user {user_id} not found")));
    }
    users.set_active(&user_id, request.active)?;

    // Deactivation also kills outstanding sessions
    if !request.active {
        state.tokens.logout_all(&user_id, &admin.user_id).await?;
    }

    Ok(Json(MessageResponse::ok(if request.active {
        "account activated"
    } else {
        "account deactivated"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::tests::test_state;
    use crate::auth::AuthenticatedUser;
    use crate::auth::Role;
    use crate::storage::StoredUser;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn seed_user(state: &AppState, handle: &str, administrator: bool) -> StoredUser {
        let now = Utc::now();
        let user = StoredUser {
            id: Uuid::new_v4().to_string(),
            handle: handle.to_string(),
            email: format!("{handle}@example.com"),
            password_hash: hash_password("correct-horse-battery").unwrap(),
            role: "user".to_string(),
            active: true,
            administrator,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        UserRepository::new(&state.db).create(&user).unwrap();
        user
    }

    fn authed(user: &StoredUser) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: user.id.clone(),
            handle: user.handle.clone(),
            role: if user.administrator {
                Role::Admin
            } else {
                Role::User
            },
            origin: "test".to_string(),
            jti: Uuid::new_v4().to_string(),
            expires_at: Utc::now().timestamp() + 3600,
            raw_token: "raw".to_string(),
        }
    }

    #[tokio::test]
    async fn me_returns_profile_without_hash() {
        let (state, _dir) = test_state();
        let user = seed_user(&state, "alice", false);

        let Json(profile) = me(Auth(authed(&user)), State(state.clone())).await.unwrap();
        assert_eq!(profile.handle, "alice");
        assert_eq!(profile.id, user.id);
    }

    #[tokio::test]
    async fn update_me_changes_email_and_rejects_duplicates() {
        let (state, _dir) = test_state();
        let user = seed_user(&state, "alice", false);
        seed_user(&state, "bob", false);

        let Json(profile) = update_me(
            Auth(authed(&user)),
            State(state.clone()),
            Json(UpdateProfileRequest {
                email: Some("new@example.com".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(profile.email, "new@example.com");

        let err = update_me(
            Auth(authed(&user)),
            State(state.clone()),
            Json(UpdateProfileRequest {
                email: Some("bob@example.com".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn change_password_verifies_current_and_revokes_sessions() {
        let (state, _dir) = test_state();
        let user = seed_user(&state, "alice", false);
        let session = state
            .tokens
            .issue_pair(&user, "test", false, None, None)
            .unwrap();

        let err = change_password(
            Auth(authed(&user)),
            State(state.clone()),
            Json(ChangePasswordRequest {
                current_password: "wrong".to_string(),
                new_password: "a-new-password".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        change_password(
            Auth(authed(&user)),
            State(state.clone()),
            Json(ChangePasswordRequest {
                current_password: "correct-horse-battery".to_string(),
                new_password: "a-new-password".to_string(),
            }),
        )
        .await
        .unwrap();

        let stored = UserRepository::new(&state.db).get(&user.id).unwrap().unwrap();
        assert!(verify_password("a-new-password", &stored.password_hash));

        // Pre-existing tokens are revoked
        let err = state
            .tokens
            .validate_access(&session.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn deactivation_revokes_outstanding_sessions() {
        let (state, _dir) = test_state();
        let admin = seed_user(&state, "root", true);
        let user = seed_user(&state, "alice", false);
        let session = state
            .tokens
            .issue_pair(&user, "test", false, None, None)
            .unwrap();

        set_user_active(
            AdminOnly(authed(&admin)),
            Path(user.id.clone()),
            State(state.clone()),
            Json(SetActiveRequest { active: false }),
        )
        .await
        .unwrap();

        let stored = UserRepository::new(&state.db).get(&user.id).unwrap().unwrap();
        assert!(!stored.active);

        let err = state
            .tokens
            .validate_access(&session.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn list_users_returns_all() {
        let (state, _dir) = test_state();
        let admin = seed_user(&state, "root", true);
        seed_user(&state, "alice", false);
        seed_user(&state, "bob", false);

        let Json(users) = list_users(AdminOnly(authed(&admin)), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(users.len(), 3);
    }
}
