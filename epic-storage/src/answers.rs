//! Answer gate
//!
//! Every answer write goes through here. Questions and answers are resolved
//! to their concrete kind, incompatible pairs are rejected before storage is
//! touched, and get-or-create survives concurrent first submissions.

use crate::EpicStore;
use epic_core::{
    check_compatibility, Answer, AnswerBody, AnswerId, EntityType, EpicError, EpicResult,
    Question, QuestionId, StorageError, UserId,
};
use tracing::{debug, warn};

/// Load a question with its concrete kind.
pub async fn resolve_question<S: EpicStore + ?Sized>(store: &S, id: QuestionId) -> EpicResult<Question> {
    store.question_get(id).await?.ok_or_else(|| {
        StorageError::NotFound {
            entity_type: EntityType::Question,
            id,
        }
        .into()
    })
}

/// Load an answer with its concrete kind.
pub async fn resolve_answer<S: EpicStore + ?Sized>(store: &S, id: AnswerId) -> EpicResult<Answer> {
    store.answer_get(id).await?.ok_or_else(|| {
        StorageError::NotFound {
            entity_type: EntityType::Answer,
            id,
        }
        .into()
    })
}

/// Return the user's answer to `question`, creating an empty one of the
/// compatible kind when none exists.
///
/// A concurrent create for the same pair surfaces as `Duplicate`; the winner's
/// row is then fetched instead.
pub async fn create_or_get_answer<S: EpicStore + ?Sized>(
    store: &S,
    user_id: UserId,
    question: &Question,
) -> EpicResult<Answer> {
    if let Some(existing) = store.answer_find(user_id, question.id).await? {
        return Ok(existing);
    }

    let answer = Answer::empty_for(user_id, question);
    match store.answer_insert(&answer).await {
        Ok(()) => {
            debug!(answer_id = %answer.id, question_id = %question.id, "Created empty answer");
            Ok(answer)
        }
        Err(EpicError::Storage(StorageError::Duplicate { .. })) => {
            warn!(
                user_id = %user_id,
                question_id = %question.id,
                "Concurrent answer creation, fetching existing row"
            );
            store
                .answer_find(user_id, question.id)
                .await?
                .ok_or_else(|| {
                    StorageError::TransactionFailed {
                        reason: format!(
                            "answer for user {} and question {} vanished after duplicate insert",
                            user_id, question.id
                        ),
                    }
                    .into()
                })
        }
        Err(e) => Err(e),
    }
}

/// Persist an answer after checking it against its question.
///
/// Rejects incompatible kinds with `UnsupportedQuestionType` and selections
/// naming programs that do not exist. Nothing is written on failure.
pub async fn save_answer<S: EpicStore + ?Sized>(store: &S, answer: &Answer) -> EpicResult<()> {
    let question = resolve_question(store, answer.question_id).await?;
    answer.check_question(&question)?;

    if let Some(selected) = answer.body.selected_programs() {
        for program_id in selected {
            if store.program_get(*program_id).await?.is_none() {
                return Err(StorageError::NotFound {
                    entity_type: EntityType::Program,
                    id: *program_id,
                }
                .into());
            }
        }
    }

    match store.answer_get(answer.id).await? {
        Some(_) => store.answer_update(answer).await,
        None => store.answer_insert(answer).await,
    }
}

/// Record `body` as the user's answer to `question_id`.
///
/// Repeated submissions update the same answer row.
pub async fn submit_answer<S: EpicStore + ?Sized>(
    store: &S,
    user_id: UserId,
    question_id: QuestionId,
    body: AnswerBody,
) -> EpicResult<Answer> {
    let question = resolve_question(store, question_id).await?;
    check_compatibility(body.kind(), question.kind())?;
    let mut answer = create_or_get_answer(store, user_id, &question).await?;
    answer.replace_body(&question, body)?;
    save_answer(store, &answer).await?;
    debug!(answer_id = %answer.id, valid = answer.is_valid_answer(), "Answer submitted");
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use epic_core::{
        Area, EpicUser, EvolutionChoice, Group, IntegrityError, Program, QuestionBody,
        QuestionKind, YesNoChoice,
    };
    use std::collections::BTreeSet;
    use std::sync::Arc;

    async fn make_test_store() -> (InMemoryStore, Program, EpicUser) {
        let store = InMemoryStore::new();
        let area = Area::new("Water");
        let group = Group::new("Flooding", area.id);
        let program = Program::new("Dikes", "", group.id);
        let user = EpicUser::new("luke", None);
        store.area_insert(&area).await.unwrap();
        store.group_insert(&group).await.unwrap();
        store.program_insert(&program).await.unwrap();
        store.user_insert(&user).await.unwrap();
        (store, program, user)
    }

    async fn add_question(store: &InMemoryStore, program: &Program, body: QuestionBody) -> Question {
        let question = Question::new(format!("{:?}", body.kind()), program.id, body);
        store.question_insert(&question).await.unwrap();
        question
    }

    #[tokio::test]
    async fn test_resolve_missing_question() {
        let (store, _, _) = make_test_store().await;
        let err = resolve_question(&store, epic_core::new_entity_id()).await.unwrap_err();
        assert!(matches!(err, EpicError::Storage(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_or_get_is_idempotent() {
        let (store, program, user) = make_test_store().await;
        let question = add_question(
            &store,
            &program,
            QuestionBody::Evolution {
                nascent_description: String::new(),
                engaged_description: String::new(),
                capable_description: String::new(),
                effective_description: String::new(),
            },
        )
        .await;

        let first = create_or_get_answer(&store, user.id, &question).await.unwrap();
        let second = create_or_get_answer(&store, user.id, &question).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.kind(), epic_core::AnswerKind::SingleChoice);
        assert!(!first.is_valid_answer());
    }

    #[tokio::test]
    async fn test_concurrent_first_submissions_share_one_answer() {
        let (store, program, user) = make_test_store().await;
        let question = Arc::new(
            add_question(
                &store,
                &program,
                QuestionBody::NationalFramework {
                    description: String::new(),
                },
            )
            .await,
        );

        let user_id = user.id;
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let question = Arc::clone(&question);
                tokio::spawn(async move { create_or_get_answer(&store, user_id, &question).await })
            })
            .collect();

        let mut ids = BTreeSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().unwrap().id);
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(store.answer_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_twice_updates_same_row() {
        let (store, program, user) = make_test_store().await;
        let question = add_question(
            &store,
            &program,
            QuestionBody::KeyAgencyActions {
                description: String::new(),
            },
        )
        .await;

        let first = submit_answer(
            &store,
            user.id,
            question.id,
            AnswerBody::YesNo {
                short_answer: Some(YesNoChoice::No),
                justify_answer: String::new(),
            },
        )
        .await
        .unwrap();
        let second = submit_answer(
            &store,
            user.id,
            question.id,
            AnswerBody::YesNo {
                short_answer: Some(YesNoChoice::Yes),
                justify_answer: "changed".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        let stored = resolve_answer(&store, first.id).await.unwrap();
        assert_eq!(stored.body.justify_answer(), Some("changed"));
        assert_eq!(store.answer_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_submit_incompatible_body_writes_nothing() {
        let (store, program, user) = make_test_store().await;
        let question = add_question(
            &store,
            &program,
            QuestionBody::NationalFramework {
                description: String::new(),
            },
        )
        .await;

        let err = submit_answer(
            &store,
            user.id,
            question.id,
            AnswerBody::SingleChoice {
                selected_choice: Some(EvolutionChoice::Capable),
                justify_answer: String::new(),
            },
        )
        .await
        .unwrap_err();

        match err {
            EpicError::Integrity(IntegrityError::UnsupportedQuestionType { question_type, supported }) => {
                assert_eq!(question_type, QuestionKind::NationalFramework);
                assert_eq!(supported, vec![QuestionKind::Evolution]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.answer_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_save_rejects_unknown_selected_program() {
        let (store, program, user) = make_test_store().await;
        let question = add_question(&store, &program, QuestionBody::Linkages).await;
        let mut answer = create_or_get_answer(&store, user.id, &question).await.unwrap();
        answer.body = AnswerBody::MultipleChoice {
            selected_programs: BTreeSet::from([epic_core::new_entity_id()]),
        };

        let err = save_answer(&store, &answer).await.unwrap_err();

        assert!(matches!(err, EpicError::Storage(StorageError::NotFound { .. })));
        let stored = resolve_answer(&store, answer.id).await.unwrap();
        assert!(!stored.is_valid_answer());
    }
}
