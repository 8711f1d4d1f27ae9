// SPDX-License-Identifier: AGPL-3.0-or-later

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! Tokens are accepted from three places, checked in order: the
//! `Authorization: Bearer` header, a `token` cookie, and a `token` query
//! parameter. Request bodies are not a token source: these extractors run
//! from [`FromRequestParts`] and cannot consume the body, so a body tier
//! cannot be added here. Validation results are cached briefly per raw
//! token so hot request paths skip signature verification.

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// Validates the access token and provides the authenticated identity.
/// Rejections carry the structured error envelope via [`AuthError`].
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // A previous extractor on the same request may have already resolved
        // the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = extract_token(parts)?;

        if let Some(user) = state.validation_cache.get(&token) {
            parts.extensions.insert(user.clone());
            return Ok(Auth(user));
        }

        let user = state.tokens.validate_access(&token).await?;
        state.validation_cache.put(&token, user.clone());
        parts.extensions.insert(user.clone());

        Ok(Auth(user))
    }
}

/// Pull the raw token out of the request.
///
/// Precedence: Authorization header, then `token` cookie, then `token`
/// query parameter. A present-but-malformed Authorization header is an
/// error rather than a fallthrough.
fn extract_token(parts: &Parts) -> Result<String, AuthError> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        let value = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?
            .trim();
        if token.is_empty() {
            return Err(AuthError::InvalidAuthHeader);
        }
        return Ok(token.to_string());
    }

    if let Some(token) = cookie_token(parts) {
        return Ok(token);
    }

    if let Some(token) = query_token(parts) {
        return Ok(token);
    }

    Err(AuthError::MissingToken)
}

/// Find a `token` cookie, if any.
fn cookie_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "token" && !value.is_empty()).then(|| value.to_string())
    })
}

/// Find a `token` query parameter, if any.
fn query_token(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == "token" && !value.is_empty()).then(|| value.to_string())
    })
}

/// Extractor that requires the admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::testing::MemoryRevocationList;
    use crate::auth::{Role, TokenService, TokenTtls, ValidationCache};
    use crate::storage::{Db, StoredUser, UserRepository};
    use axum::http::Request;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Db::open(&dir.path().join("test.redb")).unwrap());
        let tokens = Arc::new(TokenService::new(
            db.clone(),
            Arc::new(MemoryRevocationList::default()),
            b"access-secret",
            b"refresh-secret",
            TokenTtls::default(),
        ));
        let cache = Arc::new(ValidationCache::new(16, Duration::from_secs(60)));
        (AppState::new(db, tokens, cache), dir)
    }

    fn issue_token(state: &AppState, administrator: bool) -> String {
        let now = Utc::now();
        let user = StoredUser {
            id: "user-1".to_string(),
            handle: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "unused".to_string(),
            role: "user".to_string(),
            active: true,
            administrator,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        UserRepository::new(&state.db).create(&user).unwrap();
        state
            .tokens
            .issue_pair(&user, "web", false, None, None)
            .unwrap()
            .access_token
    }

    fn parts_for(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[tokio::test]
    async fn rejects_without_any_token() {
        let (state, _dir) = test_state();
        let mut parts = parts_for(Request::builder().uri("/test").body(()).unwrap());

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn accepts_bearer_header() {
        let (state, _dir) = test_state();
        let token = issue_token(&state, false);
        let mut parts = parts_for(
            Request::builder()
                .uri("/test")
                .header("Authorization", format!("Bearer {token}"))
                .body(())
                .unwrap(),
        );

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.handle, "alice");
    }

    #[tokio::test]
    async fn accepts_cookie_token() {
        let (state, _dir) = test_state();
        let token = issue_token(&state, false);
        let mut parts = parts_for(
            Request::builder()
                .uri("/test")
                .header("Cookie", format!("theme=dark; token={token}"))
                .body(())
                .unwrap(),
        );

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn accepts_query_token() {
        let (state, _dir) = test_state();
        let token = issue_token(&state, false);
        let mut parts = parts_for(
            Request::builder()
                .uri(format!("/test?page=1&token={token}"))
                .body(())
                .unwrap(),
        );

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn malformed_header_is_an_error_not_a_fallthrough() {
        let (state, _dir) = test_state();
        let token = issue_token(&state, false);
        // Valid cookie present, but the broken Authorization header wins
        let mut parts = parts_for(
            Request::builder()
                .uri("/test")
                .header("Authorization", "Token abc")
                .header("Cookie", format!("token={token}"))
                .body(())
                .unwrap(),
        );

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, _dir) = test_state();
        let mut parts = parts_for(Request::builder().uri("/test").body(()).unwrap());

        let user = AuthenticatedUser {
            user_id: "user-ext".to_string(),
            handle: "ext".to_string(),
            role: Role::Admin,
            origin: "test".to_string(),
            jti: "jti-ext".to_string(),
            expires_at: 0,
            raw_token: String::new(),
        };
        parts.extensions.insert(user);

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user-ext");
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let (state, _dir) = test_state();
        let token = issue_token(&state, false);
        let mut parts = parts_for(
            Request::builder()
                .uri("/test")
                .header("Authorization", format!("Bearer {token}"))
                .body(())
                .unwrap(),
        );

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn admin_only_accepts_admin() {
        let (state, _dir) = test_state();
        let token = issue_token(&state, true);
        let mut parts = parts_for(
            Request::builder()
                .uri("/test")
                .header("Authorization", format!("Bearer {token}"))
                .body(())
                .unwrap(),
        );

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let (state, _dir) = test_state();
        let token = issue_token(&state, false);

        let mut parts = parts_for(
            Request::builder()
                .uri("/test")
                .header("Authorization", format!("Bearer {token}"))
                .body(())
                .unwrap(),
        );
        Auth::from_request_parts(&mut parts, &state).await.unwrap();

        assert!(state.validation_cache.get(&token).is_some());
    }
}
