//! Answer Service
//!
//! Answer access for a principal. Listings cover answers of visible users;
//! opening a single answer requires owning it or being an admin.

use epic_core::{
    authorize_instance, require_admin, Answer, AnswerBody, AnswerId, EntityType, EpicUser,
    InstanceAction, IntegrityError, QuestionId, Visibility,
};
use epic_storage::{
    create_or_get_answer, resolve_answer, resolve_question, save_answer, submit_answer, EpicStore,
};

use crate::error::ApiResult;

/// Every answer the principal may read.
pub async fn list_visible_answers(store: &dyn EpicStore, principal: &EpicUser) -> ApiResult<Vec<Answer>> {
    let answers = match Visibility::for_principal(principal) {
        Visibility::All => store.answer_list().await?,
        Visibility::Only(user_id) => store.answer_list_by_user(user_id).await?,
        Visibility::Organization(organization_id) => {
            let mut answers = Vec::new();
            for member in store.user_list_by_organization(organization_id).await? {
                answers.extend(store.answer_list_by_user(member.id).await?);
            }
            answers.sort_by_key(|a| a.id);
            answers
        }
    };
    Ok(answers)
}

/// Load an answer after checking the principal may perform `action` on it.
pub async fn authorized_answer(
    store: &dyn EpicStore,
    principal: &EpicUser,
    id: AnswerId,
    action: InstanceAction,
) -> ApiResult<Answer> {
    let answer = resolve_answer(store, id).await?;
    let owner = store.user_get(answer.user_id).await?.ok_or_else(|| {
        tracing::error!(answer_id = %id, user_id = %answer.user_id, "Answer owner missing");
        IntegrityError::ResolutionFailed {
            entity_type: EntityType::User,
            id: answer.user_id,
            reason: format!("owner of answer {id} does not exist"),
        }
    })?;
    authorize_instance(principal, &owner, EntityType::Answer, id, action)?;
    Ok(answer)
}

/// The principal's answer to a question, created empty on first access.
pub async fn answer_for_question(
    store: &dyn EpicStore,
    principal: &EpicUser,
    question_id: QuestionId,
) -> ApiResult<Answer> {
    let question = resolve_question(store, question_id).await?;
    Ok(create_or_get_answer(store, principal.id, &question).await?)
}

/// Record the principal's answer. Repeated submissions update one row.
pub async fn submit_principal_answer(
    store: &dyn EpicStore,
    principal: &EpicUser,
    question_id: QuestionId,
    body: AnswerBody,
) -> ApiResult<Answer> {
    let answer = submit_answer(store, principal.id, question_id, body).await?;
    tracing::info!(
        answer_id = %answer.id,
        user_id = %principal.id,
        question_id = %question_id,
        "Answer submitted"
    );
    Ok(answer)
}

/// Replace the kind-specific fields of an answer.
pub async fn update_answer(
    store: &dyn EpicStore,
    principal: &EpicUser,
    id: AnswerId,
    body: AnswerBody,
) -> ApiResult<Answer> {
    let mut answer = authorized_answer(store, principal, id, InstanceAction::Write).await?;
    let question = resolve_question(store, answer.question_id).await?;
    answer.replace_body(&question, body).inspect_err(|e| {
        tracing::warn!(answer_id = %id, error = %e, "Rejected answer update");
    })?;
    save_answer(store, &answer).await?;
    Ok(answer)
}

pub async fn delete_answer(store: &dyn EpicStore, principal: &EpicUser, id: AnswerId) -> ApiResult<()> {
    require_admin(principal, "delete answers")?;
    resolve_answer(store, id).await?;
    store.answer_delete(id).await?;
    tracing::info!(answer_id = %id, "Answer deleted");
    Ok(())
}
