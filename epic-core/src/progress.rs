//! Per-program answering progress of one user

use crate::{Answer, AnswerId, Question, QuestionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// `progress` is the share of the program's questions the user answered
/// validly; `questions_answers` maps every question to the user's answer id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Progress {
    pub progress: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub questions_answers: BTreeMap<QuestionId, Option<AnswerId>>,
}

/// Compute progress over `questions` given one user's answers.
///
/// Answers to questions outside `questions` are ignored. A program without
/// questions has progress 0.
pub fn compute_progress<'a>(
    questions: &[Question],
    user_answers: impl IntoIterator<Item = &'a Answer>,
) -> Progress {
    let by_question: HashMap<QuestionId, &Answer> = user_answers
        .into_iter()
        .map(|a| (a.question_id, a))
        .collect();

    let mut questions_answers = BTreeMap::new();
    let mut valid = 0usize;
    for question in questions {
        let answer = by_question.get(&question.id);
        if answer.is_some_and(|a| a.is_valid_answer()) {
            valid += 1;
        }
        questions_answers.insert(question.id, answer.map(|a| a.id));
    }

    let progress = if questions.is_empty() {
        0.0
    } else {
        valid as f64 / questions.len() as f64
    };
    Progress {
        progress,
        questions_answers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{new_entity_id, AnswerBody, QuestionBody, YesNoChoice};

    fn framework(program_id: uuid::Uuid, title: &str) -> Question {
        Question::new(
            title,
            program_id,
            QuestionBody::KeyAgencyActions {
                description: String::new(),
            },
        )
    }

    #[test]
    fn test_progress_counts_only_valid_answers() {
        let program_id = new_entity_id();
        let user = new_entity_id();
        let questions = vec![
            framework(program_id, "a"),
            framework(program_id, "b"),
            framework(program_id, "c"),
            framework(program_id, "d"),
        ];
        let mut answered = Answer::empty_for(user, &questions[0]);
        answered.body = AnswerBody::YesNo {
            short_answer: Some(YesNoChoice::Yes),
            justify_answer: String::new(),
        };
        let empty = Answer::empty_for(user, &questions[1]);

        let progress = compute_progress(&questions, [&answered, &empty]);
        assert_eq!(progress.progress, 0.25);
        assert_eq!(progress.questions_answers.len(), 4);
        assert_eq!(progress.questions_answers[&questions[0].id], Some(answered.id));
        assert_eq!(progress.questions_answers[&questions[1].id], Some(empty.id));
        assert_eq!(progress.questions_answers[&questions[2].id], None);
    }

    #[test]
    fn test_program_without_questions_has_zero_progress() {
        let progress = compute_progress(&[], std::iter::empty::<&Answer>());
        assert_eq!(progress.progress, 0.0);
        assert!(progress.questions_answers.is_empty());
    }

    #[test]
    fn test_null_answer_serializes_as_null() {
        let program_id = new_entity_id();
        let question = framework(program_id, "a");
        let progress = compute_progress(std::slice::from_ref(&question), std::iter::empty::<&Answer>());
        let json = serde_json::to_value(&progress).unwrap();
        assert!(json["questions_answers"][question.id.to_string()].is_null());
        assert_eq!(json["progress"], 0.0);
    }
}
