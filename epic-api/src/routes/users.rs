//! User REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use epic_core::InstanceAction;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::{delete_user as delete_user_record, update_selected_programs, visible_user, visible_users},
    state::{AppState, SharedStore},
    types::{UpdateSelectedProgramsRequest, UserResponse},
};

/// GET /api/v1/users - List the users the caller may see
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "Users",
    responses(
        (status = 200, description = "Visible users", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = visible_users(store.as_ref(), &auth).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

/// GET /api/v1/users/me - The authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "The caller", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(AuthExtractor(auth): AuthExtractor) -> Json<UserResponse> {
    Json(UserResponse::from(auth))
}

/// PATCH /api/v1/users/me - Replace the caller's selected programs
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    tag = "Users",
    request_body = UpdateSelectedProgramsRequest,
    responses(
        (status = 200, description = "Selection stored", body = UserResponse),
        (status = 404, description = "Unknown program", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<UpdateSelectedProgramsRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = update_selected_programs(store.as_ref(), &auth, &req.selected_programs).await?;
    Ok(Json(UserResponse::from(user)))
}

/// GET /api/v1/users/{id} - Get user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 404, description = "User not found, or not the caller", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let user = visible_user(store.as_ref(), &auth, id, InstanceAction::Read).await?;
    Ok(Json(UserResponse::from(user)))
}

/// DELETE /api/v1/users/{id} - Delete a user with their answers
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Administrator rights required", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    delete_user_record(store.as_ref(), &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/me", get(get_me).patch(update_me))
        .route("/:id", get(get_user).delete(delete_user))
}
