//! Area REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use epic_core::{require_admin, Area, EntityType};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    state::{AppState, SharedStore},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/areas - List areas by name
#[utoipa::path(
    get,
    path = "/api/v1/areas",
    tag = "Areas",
    responses(
        (status = 200, description = "List of areas", body = Vec<Area>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_areas(State(store): State<SharedStore>) -> ApiResult<Json<Vec<Area>>> {
    Ok(Json(store.area_list().await?))
}

/// GET /api/v1/areas/{id} - Get area by ID
#[utoipa::path(
    get,
    path = "/api/v1/areas/{id}",
    tag = "Areas",
    params(("id" = Uuid, Path, description = "Area ID")),
    responses(
        (status = 200, description = "Area details", body = Area),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Area not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_area(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Area>> {
    let area = store
        .area_get(id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found(EntityType::Area.as_str(), id))?;
    Ok(Json(area))
}

/// DELETE /api/v1/areas/{id} - Delete an area with its groups, programs,
/// questions and answers
#[utoipa::path(
    delete,
    path = "/api/v1/areas/{id}",
    tag = "Areas",
    params(("id" = Uuid, Path, description = "Area ID")),
    responses(
        (status = 204, description = "Area deleted"),
        (status = 403, description = "Administrator rights required", body = ApiError),
        (status = 404, description = "Area not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_area(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth, "delete areas")?;
    if store.area_get(id).await?.is_none() {
        return Err(ApiError::entity_not_found(EntityType::Area.as_str(), id));
    }
    store.area_delete(id).await?;
    tracing::info!(area_id = %id, "Area deleted with its hierarchy");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_areas))
        .route("/:id", get(get_area).delete(delete_area))
}
