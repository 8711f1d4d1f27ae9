// SPDX-License-Identifier: AGPL-3.0-or-later

//! Group CRUD and membership endpoints.
//!
//! Creation, mutation, and deletion are admin-only; listing and reads are
//! open to any authenticated user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::{AdminOnly, Auth},
    error::ApiError,
    models::{CreateGroupRequest, MessageResponse, UpdateGroupRequest},
    state::AppState,
    storage::{GroupRepository, StoredGroup, UserRepository},
};

#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = "Groups",
    security(("bearer" = [])),
    responses((status = 200, body = [StoredGroup]))
)]
pub async fn list_groups(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredGroup>>, ApiError> {
    Ok(Json(GroupRepository::new(&state.db).list_all()?))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups",
    request_body = CreateGroupRequest,
    tag = "Groups",
    security(("bearer" = [])),
    responses((status = 201, body = StoredGroup), (status = 400))
)]
pub async fn create_group(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<StoredGroup>), ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("group name is required"));
    }

    let group = StoredGroup {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: request.description,
        created_at: Utc::now(),
    };
    GroupRepository::new(&state.db).create(&group)?;

    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{group_id}",
    params(("group_id" = String, Path, description = "Group identifier")),
    tag = "Groups",
    security(("bearer" = [])),
    responses((status = 200, body = StoredGroup), (status = 404))
)]
pub async fn get_group(
    Auth(_user): Auth,
    Path(group_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StoredGroup>, ApiError> {
    let group = GroupRepository::new(&state.db)
        .get(&group_id)?
        .ok_or_else(|| ApiError::not_found(format!("group {group_id} not found")))?;
    Ok(Json(group))
}

#[utoipa::path(
    put,
    path = "/api/v1/groups/{group_id}",
    params(("group_id" = String, Path, description = "Group identifier")),
    request_body = UpdateGroupRequest,
    tag = "Groups",
    security(("bearer" = [])),
    responses((status = 200, body = StoredGroup), (status = 404))
)]
pub async fn update_group(
    AdminOnly(_admin): AdminOnly,
    Path(group_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<UpdateGroupRequest>,
) -> Result<Json<StoredGroup>, ApiError> {
    let groups = GroupRepository::new(&state.db);
    let mut group = groups
        .get(&group_id)?
        .ok_or_else(|| ApiError::not_found(format!("group {group_id} not found")))?;

    // The name claims the uniqueness map at creation and stays fixed
    if let Some(name) = request.name {
        if name.trim() != group.name {
            return Err(ApiError::bad_request("group name cannot be changed"));
        }
    }
    if let Some(description) = request.description {
        group.description = Some(description);
    }
    groups.update(&group)?;

    Ok(Json(group))
}

#[utoipa::path(
    delete,
    path = "/api/v1/groups/{group_id}",
    params(("group_id" = String, Path, description = "Group identifier")),
    tag = "Groups",
    security(("bearer" = [])),
    responses((status = 204), (status = 404))
)]
pub async fn delete_group(
    AdminOnly(_admin): AdminOnly,
    Path(group_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    GroupRepository::new(&state.db).delete(&group_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{group_id}/members",
    params(("group_id" = String, Path, description = "Group identifier")),
    tag = "Groups",
    security(("bearer" = [])),
    responses((status = 200, body = [String]), (status = 404))
)]
pub async fn list_members(
    Auth(_user): Auth,
    Path(group_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let groups = GroupRepository::new(&state.db);
    if groups.get(&group_id)?.is_none() {
        return Err(ApiError::not_found(format!("group {group_id} not found")));
    }
    Ok(Json(groups.list_members(&group_id)?))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{group_id}/members/{user_id}",
    params(
        ("group_id" = String, Path, description = "Group identifier"),
        ("user_id" = String, Path, description = "User to add")
    ),
    tag = "Groups",
    security(("bearer" = [])),
    responses((status = 200, body = MessageResponse), (status = 404))
)]
pub async fn add_member(
    AdminOnly(_admin): AdminOnly,
    Path((group_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let groups = GroupRepository::new(&state.db);
    if groups.get(&group_id)?.is_none() {
        return Err(ApiError::not_found(format!("group {group_id} not found")));
    }
    if UserRepository::new(&state.db).get(&user_id)?.is_none() {
        return Err(ApiError::not_found(format!("user {user_id} not found")));
    }

    groups.add_member(&group_id, &user_id)?;
    Ok(Json(MessageResponse::ok("member added")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/groups/{group_id}/members/{user_id}",
    params(
        ("group_id" = String, Path, description = "Group identifier"),
        ("user_id" = String, Path, description = "User to remove")
    ),
    tag = "Groups",
    security(("bearer" = [])),
    responses((status = 204), (status = 404))
)]
pub async fn remove_member(
    AdminOnly(_admin): AdminOnly,
    Path((group_id, user_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    GroupRepository::new(&state.db).remove_member(&group_id, &user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::tests::test_state;
    use crate::auth::{hash_password, AuthenticatedUser, Role};
    use crate::storage::StoredUser;

    fn admin() -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: "admin-1".to_string(),
            handle: "root".to_string(),
            role: Role::Admin,
            origin: "test".to_string(),
            jti: "jti-admin".to_string(),
            expires_at: Utc::now().timestamp() + 3600,
            raw_token: "raw".to_string(),
        }
    }

    fn seed_user(state: &AppState, handle: &str) -> StoredUser {
        let now = Utc::now();
        let user = StoredUser {
            id: format!("user-{handle}"),
            handle: handle.to_string(),
            email: format!("{handle}@example.com"),
            password_hash: hash_password("irrelevant-pw").unwrap(),
            role: "user".to_string(),
            active: true,
            administrator: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        UserRepository::new(&state.db).create(&user).unwrap();
        user
    }

    async fn make_group(state: &AppState, name: &str) -> StoredGroup {
        let (status, Json(group)) = create_group(
            AdminOnly(admin()),
            State(state.clone()),
            Json(CreateGroupRequest {
                name: name.to_string(),
                description: Some("test group".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        group
    }

    #[tokio::test]
    async fn create_and_fetch_group() {
        let (state, _dir) = test_state();
        let group = make_group(&state, "ops").await;

        let Json(fetched) = get_group(
            Auth(admin()),
            Path(group.id.clone()),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(fetched, group);
    }

    #[tokio::test]
    async fn duplicate_group_name_rejected() {
        let (state, _dir) = test_state();
        make_group(&state, "ops").await;

        let err = create_group(
            AdminOnly(admin()),
            State(state.clone()),
            Json(CreateGroupRequest {
                name: "ops".to_string(),
                description: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn membership_lifecycle() {
        let (state, _dir) = test_state();
        let group = make_group(&state, "ops").await;
        let user = seed_user(&state, "alice");

        add_member(
            AdminOnly(admin()),
            Path((group.id.clone(), user.id.clone())),
            State(state.clone()),
        )
        .await
        .unwrap();

        let Json(members) = list_members(
            Auth(admin()),
            Path(group.id.clone()),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(members, vec![user.id.clone()]);

        let status = remove_member(
            AdminOnly(admin()),
            Path((group.id.clone(), user.id.clone())),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(members) = list_members(
            Auth(admin()),
            Path(group.id.clone()),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn add_member_requires_existing_user() {
        let (state, _dir) = test_state();
        let group = make_group(&state, "ops").await;

        let err = add_member(
            AdminOnly(admin()),
            Path((group.id, "ghost".to_string())),
            State(state.clone()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_group_removes_it() {
        let (state, _dir) = test_state();
        let group = make_group(&state, "ops").await;

        delete_group(AdminOnly(admin()), Path(group.id.clone()), State(state.clone()))
            .await
            .unwrap();

        let err = get_group(Auth(admin()), Path(group.id), State(state.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
