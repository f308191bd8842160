//! Program REST API Routes
//!
//! Besides the catalog operations, a program exposes its questions and the
//! caller's answering progress.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use epic_core::{require_admin, EntityType, Program, Progress, Question};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::program_progress,
    state::{AppState, SharedStore},
    types::{ProgramListQuery, QuestionListQuery},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/programs - List programs by name
#[utoipa::path(
    get,
    path = "/api/v1/programs",
    tag = "Programs",
    params(("group_id" = Option<Uuid>, Query, description = "Only programs of this group")),
    responses(
        (status = 200, description = "List of programs", body = Vec<Program>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_programs(
    State(store): State<SharedStore>,
    Query(params): Query<ProgramListQuery>,
) -> ApiResult<Json<Vec<Program>>> {
    let programs = match params.group_id {
        Some(group_id) => store.program_list_by_group(group_id).await?,
        None => store.program_list().await?,
    };
    Ok(Json(programs))
}

/// GET /api/v1/programs/{id} - Get program by ID
#[utoipa::path(
    get,
    path = "/api/v1/programs/{id}",
    tag = "Programs",
    params(("id" = Uuid, Path, description = "Program ID")),
    responses(
        (status = 200, description = "Program details", body = Program),
        (status = 404, description = "Program not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_program(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Program>> {
    let program = store
        .program_get(id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found(EntityType::Program.as_str(), id))?;
    Ok(Json(program))
}

/// DELETE /api/v1/programs/{id} - Delete a program with its questions
#[utoipa::path(
    delete,
    path = "/api/v1/programs/{id}",
    tag = "Programs",
    params(("id" = Uuid, Path, description = "Program ID")),
    responses(
        (status = 204, description = "Program deleted"),
        (status = 403, description = "Administrator rights required", body = ApiError),
        (status = 404, description = "Program not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_program(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth, "delete programs")?;
    if store.program_get(id).await?.is_none() {
        return Err(ApiError::entity_not_found(EntityType::Program.as_str(), id));
    }
    store.program_delete(id).await?;
    tracing::info!(program_id = %id, "Program deleted with its questions");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/programs/{id}/questions - Questions of a program
#[utoipa::path(
    get,
    path = "/api/v1/programs/{id}/questions",
    tag = "Programs",
    params(
        ("id" = Uuid, Path, description = "Program ID"),
        ("kind" = Option<String>, Query, description = "NationalFramework, KeyAgencyActions, Evolution or Linkages"),
    ),
    responses(
        (status = 200, description = "Questions of the program", body = Vec<Question>),
        (status = 404, description = "Program not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_program_questions(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
    Query(params): Query<QuestionListQuery>,
) -> ApiResult<Json<Vec<Question>>> {
    if store.program_get(id).await?.is_none() {
        return Err(ApiError::entity_not_found(EntityType::Program.as_str(), id));
    }
    let mut questions = store.question_list_by_program(id).await?;
    if let Some(kind) = params.kind {
        questions.retain(|q| q.kind() == kind);
    }
    Ok(Json(questions))
}

/// GET /api/v1/programs/{id}/progress - The caller's progress on a program
#[utoipa::path(
    get,
    path = "/api/v1/programs/{id}/progress",
    tag = "Programs",
    params(("id" = Uuid, Path, description = "Program ID")),
    responses(
        (status = 200, description = "Share of questions answered validly", body = Progress),
        (status = 404, description = "Program not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_program_progress(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Progress>> {
    Ok(Json(program_progress(store.as_ref(), id, &auth).await?))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_programs))
        .route("/:id", get(get_program).delete(delete_program))
        .route("/:id/questions", get(list_program_questions))
        .route("/:id/progress", get(get_program_progress))
}
