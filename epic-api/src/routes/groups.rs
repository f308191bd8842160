//! Group REST API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use epic_core::{require_admin, EntityType, Group};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    state::{AppState, SharedStore},
    types::GroupListQuery,
};

/// GET /api/v1/groups - List groups, optionally of one area
#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = "Groups",
    params(("area_id" = Option<Uuid>, Query, description = "Only groups of this area")),
    responses(
        (status = 200, description = "List of groups", body = Vec<Group>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_groups(
    State(store): State<SharedStore>,
    Query(params): Query<GroupListQuery>,
) -> ApiResult<Json<Vec<Group>>> {
    let groups = match params.area_id {
        Some(area_id) => store.group_list_by_area(area_id).await?,
        None => store.group_list().await?,
    };
    Ok(Json(groups))
}

/// GET /api/v1/groups/{id} - Get group by ID
#[utoipa::path(
    get,
    path = "/api/v1/groups/{id}",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group details", body = Group),
        (status = 404, description = "Group not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_group(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Group>> {
    let group = store
        .group_get(id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found(EntityType::Group.as_str(), id))?;
    Ok(Json(group))
}

/// DELETE /api/v1/groups/{id} - Delete a group with its programs
#[utoipa::path(
    delete,
    path = "/api/v1/groups/{id}",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 403, description = "Administrator rights required", body = ApiError),
        (status = 404, description = "Group not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_group(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth, "delete groups")?;
    if store.group_get(id).await?.is_none() {
        return Err(ApiError::entity_not_found(EntityType::Group.as_str(), id));
    }
    store.group_delete(id).await?;
    tracing::info!(group_id = %id, "Group deleted with its programs");
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_groups))
        .route("/:id", get(get_group).delete(delete_group))
}
