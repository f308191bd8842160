//! Question REST API Routes

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use epic_core::{Answer, Question};
use epic_storage::resolve_question;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    services::answer_for_question,
    state::{AppState, SharedStore},
    types::QuestionListQuery,
};

/// GET /api/v1/questions - List questions, optionally of one kind
#[utoipa::path(
    get,
    path = "/api/v1/questions",
    tag = "Questions",
    params(("kind" = Option<String>, Query, description = "NationalFramework, KeyAgencyActions, Evolution or Linkages")),
    responses(
        (status = 200, description = "List of questions", body = Vec<Question>),
        (status = 400, description = "Unknown question kind", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_questions(
    State(store): State<SharedStore>,
    Query(params): Query<QuestionListQuery>,
) -> ApiResult<Json<Vec<Question>>> {
    let questions = match params.kind {
        Some(kind) => store.question_list_by_kind(kind).await?,
        None => store.question_list().await?,
    };
    Ok(Json(questions))
}

/// GET /api/v1/questions/{id} - Get question by ID with its kind fields
#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}",
    tag = "Questions",
    params(("id" = Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "Question details", body = Question),
        (status = 404, description = "Question not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_question(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Question>> {
    Ok(Json(resolve_question(store.as_ref(), id).await?))
}

/// GET /api/v1/questions/{id}/answer - The caller's answer, created empty
/// on first access
#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}/answer",
    tag = "Questions",
    params(("id" = Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "The caller's answer", body = Answer),
        (status = 404, description = "Question not found", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_question_answer(
    State(store): State<SharedStore>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Answer>> {
    Ok(Json(answer_for_question(store.as_ref(), &auth, id).await?))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions))
        .route("/:id", get(get_question))
        .route("/:id/answer", get(get_question_answer))
}
