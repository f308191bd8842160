//! Administrative REST API Routes
//!
//! Bulk imports of the catalog and the question sets, and linkages
//! generation. Rows are sent as JSON objects keyed by column header. Every
//! route requires an administrator.

use axum::{extract::State, routing::post, Json, Router};
use epic_core::{require_admin, QuestionKind};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::{
        generate_linkages as regenerate_linkages, import_agencies as import_agency_rows,
        import_domain as import_domain_rows, import_evolution_questions,
        import_framework_questions, JsonRows,
    },
    state::{AppState, SharedStore},
    types::{GenerateLinkagesResponse, ImportSummary},
};

// ============================================================================
// IMPORTS
// ============================================================================

/// POST /api/v1/admin/import/domain - Import areas, groups and programs
#[utoipa::path(
    post,
    path = "/api/v1/admin/import/domain",
    tag = "Admin",
    request_body = JsonRows,
    responses(
        (status = 200, description = "Rows imported", body = ImportSummary),
        (status = 400, description = "Row is missing a required column", body = ApiError),
        (status = 403, description = "Administrator rights required", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn import_domain(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Json(rows): Json<JsonRows>,
) -> ApiResult<Json<ImportSummary>> {
    require_admin(&auth, "import the domain")?;
    Ok(Json(import_domain_rows(store.as_ref(), &rows).await?))
}

/// POST /api/v1/admin/import/agencies - Import agencies and their programs
#[utoipa::path(
    post,
    path = "/api/v1/admin/import/agencies",
    tag = "Admin",
    request_body = JsonRows,
    responses(
        (status = 200, description = "Rows imported", body = ImportSummary),
        (status = 400, description = "Unknown programs referenced", body = ApiError),
        (status = 403, description = "Administrator rights required", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn import_agencies(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Json(rows): Json<JsonRows>,
) -> ApiResult<Json<ImportSummary>> {
    require_admin(&auth, "import agencies")?;
    Ok(Json(import_agency_rows(store.as_ref(), &rows).await?))
}

/// POST /api/v1/admin/import/nationalframework - Replace national framework questions
#[utoipa::path(
    post,
    path = "/api/v1/admin/import/nationalframework",
    tag = "Admin",
    request_body = JsonRows,
    responses(
        (status = 200, description = "Questions replaced", body = ImportSummary),
        (status = 400, description = "Unknown programs referenced", body = ApiError),
        (status = 403, description = "Administrator rights required", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn import_national_framework(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Json(rows): Json<JsonRows>,
) -> ApiResult<Json<ImportSummary>> {
    require_admin(&auth, "import questions")?;
    let summary =
        import_framework_questions(store.as_ref(), QuestionKind::NationalFramework, &rows).await?;
    Ok(Json(summary))
}

/// POST /api/v1/admin/import/keyagencyactions - Replace key agency actions questions
#[utoipa::path(
    post,
    path = "/api/v1/admin/import/keyagencyactions",
    tag = "Admin",
    request_body = JsonRows,
    responses(
        (status = 200, description = "Questions replaced", body = ImportSummary),
        (status = 400, description = "Unknown programs referenced", body = ApiError),
        (status = 403, description = "Administrator rights required", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn import_key_agency_actions(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Json(rows): Json<JsonRows>,
) -> ApiResult<Json<ImportSummary>> {
    require_admin(&auth, "import questions")?;
    let summary =
        import_framework_questions(store.as_ref(), QuestionKind::KeyAgencyActions, &rows).await?;
    Ok(Json(summary))
}

/// POST /api/v1/admin/import/evolution - Replace evolution questions
#[utoipa::path(
    post,
    path = "/api/v1/admin/import/evolution",
    tag = "Admin",
    request_body = JsonRows,
    responses(
        (status = 200, description = "Questions replaced", body = ImportSummary),
        (status = 400, description = "Unknown programs referenced", body = ApiError),
        (status = 403, description = "Administrator rights required", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn import_evolution(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Json(rows): Json<JsonRows>,
) -> ApiResult<Json<ImportSummary>> {
    require_admin(&auth, "import questions")?;
    Ok(Json(import_evolution_questions(store.as_ref(), &rows).await?))
}

// ============================================================================
// LINKAGES
// ============================================================================

/// POST /api/v1/admin/generate-linkages - One linkages question per program
#[utoipa::path(
    post,
    path = "/api/v1/admin/generate-linkages",
    tag = "Admin",
    responses(
        (status = 200, description = "Linkages questions regenerated", body = GenerateLinkagesResponse),
        (status = 403, description = "Administrator rights required", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn generate_linkages(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<GenerateLinkagesResponse>> {
    require_admin(&auth, "generate linkages")?;
    let created = regenerate_linkages(store.as_ref()).await?;
    Ok(Json(GenerateLinkagesResponse {
        created: created.len(),
    }))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/import/domain", post(import_domain))
        .route("/import/agencies", post(import_agencies))
        .route("/import/nationalframework", post(import_national_framework))
        .route("/import/keyagencyactions", post(import_key_agency_actions))
        .route("/import/evolution", post(import_evolution))
        .route("/generate-linkages", post(generate_linkages))
}
