//! Answers and the question/answer compatibility gate

use crate::{
    new_entity_id, AnswerId, AnswerKind, EvolutionChoice, IntegrityError, ProgramId, Question,
    QuestionId, QuestionKind, UserId, YesNoChoice,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind-specific answer fields. An empty choice means "not answered yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind")]
pub enum AnswerBody {
    YesNo {
        #[serde(default)]
        short_answer: Option<YesNoChoice>,
        #[serde(default)]
        justify_answer: String,
    },
    SingleChoice {
        #[serde(default)]
        selected_choice: Option<EvolutionChoice>,
        #[serde(default)]
        justify_answer: String,
    },
    MultipleChoice {
        #[serde(default)]
        #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
        selected_programs: BTreeSet<ProgramId>,
    },
}

impl AnswerBody {
    /// The unanswered body of a given kind.
    pub fn empty(kind: AnswerKind) -> Self {
        match kind {
            AnswerKind::YesNo => AnswerBody::YesNo {
                short_answer: None,
                justify_answer: String::new(),
            },
            AnswerKind::SingleChoice => AnswerBody::SingleChoice {
                selected_choice: None,
                justify_answer: String::new(),
            },
            AnswerKind::MultipleChoice => AnswerBody::MultipleChoice {
                selected_programs: BTreeSet::new(),
            },
        }
    }

    pub fn kind(&self) -> AnswerKind {
        match self {
            AnswerBody::YesNo { .. } => AnswerKind::YesNo,
            AnswerBody::SingleChoice { .. } => AnswerKind::SingleChoice,
            AnswerBody::MultipleChoice { .. } => AnswerKind::MultipleChoice,
        }
    }

    /// True once the choice field holds a value.
    pub fn is_valid_answer(&self) -> bool {
        match self {
            AnswerBody::YesNo { short_answer, .. } => short_answer.is_some(),
            AnswerBody::SingleChoice { selected_choice, .. } => selected_choice.is_some(),
            AnswerBody::MultipleChoice { selected_programs } => !selected_programs.is_empty(),
        }
    }

    pub fn justify_answer(&self) -> Option<&str> {
        match self {
            AnswerBody::YesNo { justify_answer, .. }
            | AnswerBody::SingleChoice { justify_answer, .. } => Some(justify_answer),
            AnswerBody::MultipleChoice { .. } => None,
        }
    }

    pub fn selected_programs(&self) -> Option<&BTreeSet<ProgramId>> {
        match self {
            AnswerBody::MultipleChoice { selected_programs } => Some(selected_programs),
            _ => None,
        }
    }
}

/// A user's answer to one question. At most one exists per `(user, question)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Answer {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: AnswerId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub user_id: UserId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub question_id: QuestionId,
    #[serde(flatten)]
    pub body: AnswerBody,
}

/// Fails unless `answer_kind` may reference a question of `question_kind`.
pub fn check_compatibility(
    answer_kind: AnswerKind,
    question_kind: QuestionKind,
) -> Result<(), IntegrityError> {
    if answer_kind.supports(question_kind) {
        Ok(())
    } else {
        Err(IntegrityError::UnsupportedQuestionType {
            question_type: question_kind,
            supported: answer_kind.supported_questions().to_vec(),
        })
    }
}

impl Answer {
    /// Build an answer, rejecting bodies that cannot answer `question`.
    pub fn new(user_id: UserId, question: &Question, body: AnswerBody) -> Result<Self, IntegrityError> {
        check_compatibility(body.kind(), question.kind())?;
        Ok(Self {
            id: new_entity_id(),
            user_id,
            question_id: question.id,
            body,
        })
    }

    /// The empty answer of the kind compatible with `question`.
    pub fn empty_for(user_id: UserId, question: &Question) -> Self {
        Self {
            id: new_entity_id(),
            user_id,
            question_id: question.id,
            body: AnswerBody::empty(AnswerKind::for_question(question.kind())),
        }
    }

    pub fn kind(&self) -> AnswerKind {
        self.body.kind()
    }

    pub fn is_valid_answer(&self) -> bool {
        self.body.is_valid_answer()
    }

    /// Check this answer against the question it references.
    pub fn check_question(&self, question: &Question) -> Result<(), IntegrityError> {
        check_compatibility(self.kind(), question.kind())
    }

    /// Replace the answer fields in place, keeping id, user and question.
    pub fn replace_body(&mut self, question: &Question, body: AnswerBody) -> Result<(), IntegrityError> {
        check_compatibility(body.kind(), question.kind())?;
        self.body = body;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QuestionBody, new_entity_id};
    use proptest::prelude::*;

    fn question_of(kind: QuestionKind) -> Question {
        let body = match kind {
            QuestionKind::NationalFramework => QuestionBody::NationalFramework {
                description: String::new(),
            },
            QuestionKind::KeyAgencyActions => QuestionBody::KeyAgencyActions {
                description: String::new(),
            },
            QuestionKind::Evolution => QuestionBody::Evolution {
                nascent_description: String::new(),
                engaged_description: String::new(),
                capable_description: String::new(),
                effective_description: String::new(),
            },
            QuestionKind::Linkages => QuestionBody::Linkages,
        };
        Question::new("q", new_entity_id(), body)
    }

    #[test]
    fn test_empty_for_picks_compatible_kind() {
        let user = new_entity_id();
        for kind in QuestionKind::ALL {
            let question = question_of(kind);
            let answer = Answer::empty_for(user, &question);
            assert!(answer.check_question(&question).is_ok());
            assert!(!answer.is_valid_answer());
        }
    }

    #[test]
    fn test_yes_no_against_evolution_is_rejected() {
        let question = question_of(QuestionKind::Evolution);
        let err = Answer::new(new_entity_id(), &question, AnswerBody::empty(AnswerKind::YesNo))
            .unwrap_err();
        assert_eq!(
            err,
            IntegrityError::UnsupportedQuestionType {
                question_type: QuestionKind::Evolution,
                supported: vec![QuestionKind::NationalFramework, QuestionKind::KeyAgencyActions],
            }
        );
    }

    #[test]
    fn test_replace_body_keeps_identity() {
        let question = question_of(QuestionKind::KeyAgencyActions);
        let mut answer = Answer::empty_for(new_entity_id(), &question);
        let id = answer.id;
        answer
            .replace_body(
                &question,
                AnswerBody::YesNo {
                    short_answer: Some(YesNoChoice::No),
                    justify_answer: "not yet".to_string(),
                },
            )
            .unwrap();
        assert_eq!(answer.id, id);
        assert!(answer.is_valid_answer());

        let rejected = answer.replace_body(&question, AnswerBody::empty(AnswerKind::MultipleChoice));
        assert!(rejected.is_err());
        assert_eq!(answer.kind(), AnswerKind::YesNo);
    }

    #[test]
    fn test_serialized_answer_has_subtype_fields() {
        let question = question_of(QuestionKind::Evolution);
        let answer = Answer::new(
            new_entity_id(),
            &question,
            AnswerBody::SingleChoice {
                selected_choice: Some(EvolutionChoice::Engaged),
                justify_answer: "Ipsum anim fugiat".to_string(),
            },
        )
        .unwrap();
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["kind"], "SingleChoice");
        assert_eq!(json["selected_choice"], "ENGAGED");
        assert_eq!(json["justify_answer"], "Ipsum anim fugiat");
        assert_eq!(json["question_id"], question.id.to_string());
    }

    fn any_answer_body() -> impl Strategy<Value = AnswerBody> {
        prop_oneof![
            (proptest::option::of(prop_oneof![Just(YesNoChoice::Yes), Just(YesNoChoice::No)]), ".{0,8}")
                .prop_map(|(short_answer, justify_answer)| AnswerBody::YesNo {
                    short_answer,
                    justify_answer,
                }),
            (proptest::option::of(proptest::sample::select(EvolutionChoice::ALL.to_vec())), ".{0,8}")
                .prop_map(|(selected_choice, justify_answer)| AnswerBody::SingleChoice {
                    selected_choice,
                    justify_answer,
                }),
            (0usize..4).prop_map(|n| AnswerBody::MultipleChoice {
                selected_programs: (0..n).map(|_| new_entity_id()).collect(),
            }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: construction succeeds exactly for pairs in the compatibility table
        #[test]
        fn prop_constructor_follows_compatibility_table(
            body in any_answer_body(),
            question_kind in proptest::sample::select(QuestionKind::ALL.to_vec()),
        ) {
            let question = question_of(question_kind);
            let supported = body.kind().supported_questions().contains(&question_kind);
            let result = Answer::new(new_entity_id(), &question, body);
            prop_assert_eq!(result.is_ok(), supported);
        }

        /// Property: validity is exactly "choice field is set"
        #[test]
        fn prop_validity_predicate(body in any_answer_body()) {
            let expected = match &body {
                AnswerBody::YesNo { short_answer, .. } => short_answer.is_some(),
                AnswerBody::SingleChoice { selected_choice, .. } => selected_choice.is_some(),
                AnswerBody::MultipleChoice { selected_programs } => !selected_programs.is_empty(),
            };
            prop_assert_eq!(body.is_valid_answer(), expected);
        }
    }
}
