//! Answer REST API Routes
//!
//! Every listing and lookup is scoped to the answers the caller may see.
//! Records outside that scope are reported as missing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use epic_core::{Answer, AnswerBody, InstanceAction};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::{
        authorized_answer, delete_answer as delete_answer_record, list_visible_answers,
        submit_principal_answer, update_answer as update_answer_record,
    },
    state::{AppState, SharedStore},
    types::SubmitAnswerRequest,
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/answers - List visible answers
#[utoipa::path(
    get,
    path = "/api/v1/answers",
    tag = "Answers",
    responses(
        (status = 200, description = "Answers of the users the caller may see", body = Vec<Answer>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_answers(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<Vec<Answer>>> {
    Ok(Json(list_visible_answers(store.as_ref(), &auth).await?))
}

/// POST /api/v1/answers - Submit the caller's answer to a question
#[utoipa::path(
    post,
    path = "/api/v1/answers",
    tag = "Answers",
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer stored", body = Answer),
        (status = 422, description = "Answer kind does not fit the question", body = ApiError),
        (status = 404, description = "Question not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit_answer(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<SubmitAnswerRequest>,
) -> ApiResult<Json<Answer>> {
    let answer = submit_principal_answer(store.as_ref(), &auth, req.question_id, req.body).await?;
    Ok(Json(answer))
}

/// GET /api/v1/answers/{id} - Get answer by ID
#[utoipa::path(
    get,
    path = "/api/v1/answers/{id}",
    tag = "Answers",
    params(("id" = Uuid, Path, description = "Answer ID")),
    responses(
        (status = 200, description = "Answer details", body = Answer),
        (status = 404, description = "Answer not found, or not owned by the caller", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_answer(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Answer>> {
    let answer = authorized_answer(store.as_ref(), &auth, id, InstanceAction::Read).await?;
    Ok(Json(answer))
}

/// PATCH /api/v1/answers/{id} - Replace the fields of an answer
#[utoipa::path(
    patch,
    path = "/api/v1/answers/{id}",
    tag = "Answers",
    params(("id" = Uuid, Path, description = "Answer ID")),
    request_body = AnswerBody,
    responses(
        (status = 200, description = "Answer updated", body = Answer),
        (status = 422, description = "Answer kind does not fit the question", body = ApiError),
        (status = 403, description = "Only the owner may change an answer", body = ApiError),
        (status = 404, description = "Answer not found or not visible", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_answer(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
    Json(body): Json<AnswerBody>,
) -> ApiResult<Json<Answer>> {
    Ok(Json(update_answer_record(store.as_ref(), &auth, id, body).await?))
}

/// DELETE /api/v1/answers/{id} - Delete an answer
#[utoipa::path(
    delete,
    path = "/api/v1/answers/{id}",
    tag = "Answers",
    params(("id" = Uuid, Path, description = "Answer ID")),
    responses(
        (status = 204, description = "Answer deleted"),
        (status = 403, description = "Administrator rights required", body = ApiError),
        (status = 404, description = "Answer not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_answer(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    delete_answer_record(store.as_ref(), &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_answers).post(submit_answer))
        .route(
            "/:id",
            get(get_answer).patch(update_answer).delete(delete_answer),
        )
}
