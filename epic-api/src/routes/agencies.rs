//! Agency REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use epic_core::{require_admin, Agency, EntityType};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    state::{AppState, SharedStore},
};

/// GET /api/v1/agencies - List agencies
#[utoipa::path(
    get,
    path = "/api/v1/agencies",
    tag = "Agencies",
    responses(
        (status = 200, description = "List of agencies", body = Vec<Agency>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_agencies(State(store): State<SharedStore>) -> ApiResult<Json<Vec<Agency>>> {
    Ok(Json(store.agency_list().await?))
}

/// GET /api/v1/agencies/{id} - Get agency by ID
#[utoipa::path(
    get,
    path = "/api/v1/agencies/{id}",
    tag = "Agencies",
    params(("id" = Uuid, Path, description = "Agency ID")),
    responses(
        (status = 200, description = "Agency details", body = Agency),
        (status = 404, description = "Agency not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_agency(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Agency>> {
    let agency = store
        .agency_get(id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found(EntityType::Agency.as_str(), id))?;
    Ok(Json(agency))
}

/// DELETE /api/v1/agencies/{id} - Delete an agency. Its programs stay.
#[utoipa::path(
    delete,
    path = "/api/v1/agencies/{id}",
    tag = "Agencies",
    params(("id" = Uuid, Path, description = "Agency ID")),
    responses(
        (status = 204, description = "Agency deleted"),
        (status = 403, description = "Administrator rights required", body = ApiError),
        (status = 404, description = "Agency not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_agency(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth, "delete agencies")?;
    if store.agency_get(id).await?.is_none() {
        return Err(ApiError::entity_not_found(EntityType::Agency.as_str(), id));
    }
    store.agency_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agencies))
        .route("/:id", get(get_agency).delete(delete_agency))
}
