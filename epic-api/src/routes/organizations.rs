//! Organization REST API Routes
//!
//! Organizations group users for visibility and reporting. Reports cover the
//! answers the caller may see, so an organization member gets the report of
//! their own organization and an administrator gets everyone's.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use epic_core::{require_admin, EpicOrganization, ProgramReport};
use uuid::Uuid;

use crate::{
    config::ApiConfig,
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    render::ReportRenderer,
    services::{
        create_organization as create_organization_record, generate_users as generate_member_users,
        organization_report, report_document, visible_organization, visible_organizations,
    },
    state::{AppState, SharedStore},
    types::{CreateOrganizationRequest, GenerateUsersRequest, GenerateUsersResponse},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/organizations - List visible organizations
#[utoipa::path(
    get,
    path = "/api/v1/organizations",
    tag = "Organizations",
    responses(
        (status = 200, description = "Organizations the caller may see", body = Vec<EpicOrganization>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_organizations(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<Vec<EpicOrganization>>> {
    Ok(Json(visible_organizations(store.as_ref(), &auth).await?))
}

/// POST /api/v1/organizations - Create an organization
#[utoipa::path(
    post,
    path = "/api/v1/organizations",
    tag = "Organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = EpicOrganization),
        (status = 400, description = "Missing name", body = ApiError),
        (status = 403, description = "Administrator rights required", body = ApiError),
        (status = 409, description = "Name already taken", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_organization(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateOrganizationRequest>,
) -> ApiResult<impl IntoResponse> {
    let organization = create_organization_record(store.as_ref(), &auth, &req.name).await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

/// GET /api/v1/organizations/{id} - Get organization by ID
#[utoipa::path(
    get,
    path = "/api/v1/organizations/{id}",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization details", body = EpicOrganization),
        (status = 404, description = "Organization not found or not visible", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_organization(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EpicOrganization>> {
    Ok(Json(visible_organization(store.as_ref(), &auth, id).await?))
}

/// POST /api/v1/organizations/{id}/generate-users - Create member logins
#[utoipa::path(
    post,
    path = "/api/v1/organizations/{id}/generate-users",
    tag = "Organizations",
    params(("id" = Uuid, Path, description = "Organization ID")),
    request_body = GenerateUsersRequest,
    responses(
        (status = 201, description = "Generated usernames and passwords", body = GenerateUsersResponse),
        (status = 400, description = "Invalid count", body = ApiError),
        (status = 403, description = "Administrator rights required", body = ApiError),
        (status = 404, description = "Organization not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn generate_users(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
    Json(req): Json<GenerateUsersRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&auth, "generate users")?;
    let organization = visible_organization(store.as_ref(), &auth, id).await?;
    let users = generate_member_users(store.as_ref(), &organization, req.count).await?;
    Ok((
        StatusCode::CREATED,
        Json(GenerateUsersResponse {
            organization_id: organization.id,
            users,
        }),
    ))
}

/// GET /api/v1/organizations/report - Report over the visible answers
#[utoipa::path(
    get,
    path = "/api/v1/organizations/report",
    tag = "Organizations",
    responses(
        (status = 200, description = "One entry per program, questions by title", body = Vec<ProgramReport>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_report(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<Vec<ProgramReport>>> {
    Ok(Json(organization_report(store.as_ref(), &auth).await?))
}

/// GET /api/v1/organizations/report-document - Report as a downloadable document
#[utoipa::path(
    get,
    path = "/api/v1/organizations/report-document",
    tag = "Organizations",
    responses(
        (status = 200, description = "Rendered report attachment", content_type = "text/plain"),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 504, description = "Report generation timed out", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_report_document(
    State(store): State<SharedStore>,
    State(renderer): State<Arc<dyn ReportRenderer>>,
    State(config): State<Arc<ApiConfig>>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Response> {
    let document = tokio::time::timeout(
        config.report_timeout,
        report_document(store.as_ref(), renderer.as_ref(), &auth),
    )
    .await
    .map_err(|_| {
        tracing::warn!(user_id = %auth.id, timeout = ?config.report_timeout, "Report generation timed out");
        ApiError::timeout("report generation")
    })??;

    let disposition = format!("attachment; filename=\"{}\"", document.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, document.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_organizations).post(create_organization))
        .route("/report", get(get_report))
        .route("/report-document", get(get_report_document))
        .route("/:id", get(get_organization))
        .route("/:id/generate-users", post(generate_users))
}
