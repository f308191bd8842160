//! Report assembly
//!
//! Walks program → question → answer and produces the nested structure the
//! JSON report endpoint returns and the document renderer consumes.

use crate::{
    detailed_summary, Answer, DetailedSummary, Program, ProgramId, Question, QuestionId, UserId,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Everything a report reads, loaded in one pass.
#[derive(Debug, Clone, Default)]
pub struct ReportSnapshot {
    pub programs: Vec<Program>,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuestionAnswers {
    pub answers: Vec<Answer>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub summary: DetailedSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuestionReport {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: QuestionId,
    pub title: String,
    pub question_answers: QuestionAnswers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProgramReport {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: ProgramId,
    pub name: String,
    pub questions: Vec<QuestionReport>,
}

impl ProgramReport {
    /// True when no question of the program received a visible answer.
    pub fn is_unanswered(&self) -> bool {
        self.questions
            .iter()
            .all(|q| q.question_answers.answers.is_empty())
    }
}

/// Build the report of one program from answers by `visible_users`.
///
/// Questions are ordered by title. A question without visible answers gets
/// an empty answer list and an empty summary.
pub fn build_program_report(
    program: &Program,
    questions: &[&Question],
    answers_by_question: &HashMap<QuestionId, Vec<&Answer>>,
    visible_users: &HashSet<UserId>,
    program_names: &HashMap<ProgramId, String>,
) -> ProgramReport {
    let mut ordered: Vec<&Question> = questions
        .iter()
        .copied()
        .filter(|q| q.program_id == program.id)
        .collect();
    ordered.sort_by(|a, b| a.title.cmp(&b.title));

    let questions = ordered
        .into_iter()
        .map(|question| {
            let visible: Vec<&Answer> = answers_by_question
                .get(&question.id)
                .map(|answers| {
                    answers
                        .iter()
                        .copied()
                        .filter(|a| visible_users.contains(&a.user_id))
                        .collect()
                })
                .unwrap_or_default();

            let summary = if visible.is_empty() {
                DetailedSummary::default()
            } else {
                detailed_summary(visible.iter().copied(), program_names)
            };

            QuestionReport {
                id: question.id,
                title: question.title.clone(),
                question_answers: QuestionAnswers {
                    answers: visible.into_iter().cloned().collect(),
                    summary,
                },
            }
        })
        .collect();

    ProgramReport {
        id: program.id,
        name: program.name.clone(),
        questions,
    }
}

/// Build one report per program, ordered by program name.
pub fn build_organization_report(
    snapshot: &ReportSnapshot,
    visible_users: &HashSet<UserId>,
) -> Vec<ProgramReport> {
    let program_names: HashMap<ProgramId, String> = snapshot
        .programs
        .iter()
        .map(|p| (p.id, p.name.clone()))
        .collect();

    let mut questions_by_program: HashMap<ProgramId, Vec<&Question>> = HashMap::new();
    for question in &snapshot.questions {
        questions_by_program
            .entry(question.program_id)
            .or_default()
            .push(question);
    }

    let mut answers_by_question: HashMap<QuestionId, Vec<&Answer>> = HashMap::new();
    for answer in &snapshot.answers {
        answers_by_question
            .entry(answer.question_id)
            .or_default()
            .push(answer);
    }

    let mut programs: Vec<&Program> = snapshot.programs.iter().collect();
    programs.sort_by(|a, b| a.name.cmp(&b.name));

    programs
        .into_iter()
        .map(|program| {
            let questions = questions_by_program
                .get(&program.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            build_program_report(
                program,
                questions,
                &answers_by_question,
                visible_users,
                &program_names,
            )
        })
        .collect()
}
