//! Report Document Rendering
//!
//! Turns the program reports of an organization into a paged document.
//! The document layout is fixed: a title page, an abstract naming who asked
//! for the report and when, a table of contents and one section per program
//! with a bar chart and the justifications of every answered question.

use chrono::Utc;
use epic_core::{ProgramReport, QuestionReport, Timestamp};

use crate::error::ApiResult;

pub const REPORT_TITLE: &str = "Epic Report";
pub const REPORT_DESCRIPTION: &str = "An automatic generated report containing all the questions and answers taken by the users of the organization.";

/// Lines of body text per page, footer excluded.
const PAGE_HEIGHT: usize = 56;
const BAR_WIDTH: usize = 40;

/// Who asked for a report and when.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub requested_by: String,
    pub generated_at: Timestamp,
}

impl ReportMeta {
    pub fn now(requested_by: impl Into<String>) -> Self {
        Self {
            requested_by: requested_by.into(),
            generated_at: Utc::now(),
        }
    }
}

/// A rendered document ready to be served.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub content_type: &'static str,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Renders organization reports into a downloadable document.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, reports: &[ProgramReport], meta: &ReportMeta) -> ApiResult<RenderedDocument>;
}

/// Plain-text renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReportRenderer;

impl ReportRenderer for TextReportRenderer {
    fn render(&self, reports: &[ProgramReport], meta: &ReportMeta) -> ApiResult<RenderedDocument> {
        let text = render_text(reports, meta);
        Ok(RenderedDocument {
            content_type: "text/plain; charset=utf-8",
            file_name: format!("epic_report_{}.txt", meta.generated_at.format("%Y%m%d_%H%M%S")),
            bytes: text.into_bytes(),
        })
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Ordered pages, each a list of lines. A new section always opens a page.
#[derive(Default)]
struct Pages {
    pages: Vec<Vec<String>>,
}

impl Pages {
    fn break_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn line(&mut self, line: impl Into<String>) {
        if self.pages.last().map_or(true, |p| p.len() >= PAGE_HEIGHT) {
            self.break_page();
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(line.into());
        }
    }

    fn blank(&mut self) {
        self.line(String::new());
    }

    fn heading(&mut self, text: &str, underline: char) {
        self.line(text);
        self.line(underline.to_string().repeat(text.chars().count()));
        self.blank();
    }

    /// 1-based number of the page the next line lands on.
    fn current_page(&self) -> usize {
        self.pages.len().max(1)
    }

    fn len(&self) -> usize {
        self.pages.len()
    }
}

/// Lay out a document and join its pages, each closed by a footer.
pub fn render_text(reports: &[ProgramReport], meta: &ReportMeta) -> String {
    let sections: Vec<(&ProgramReport, Vec<&QuestionReport>)> = reports
        .iter()
        .map(|p| (p, answered_questions(p)))
        .filter(|(_, questions)| !questions.is_empty())
        .collect();

    // Front matter: title page, abstract, table of contents.
    let mut front = Pages::default();
    front.break_page();
    front.line("");
    front.line("");
    front.line(center(REPORT_TITLE));
    front.break_page();
    front.heading("Abstract", '=');
    front.line(REPORT_DESCRIPTION);
    front.line(format!("Report requested by: {}.", meta.requested_by));
    front.line(format!(
        "Report generated on: {}.",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let mut body = Pages::default();
    let mut toc = Vec::with_capacity(sections.len());
    for (program, questions) in &sections {
        body.break_page();
        toc.push((program.name.as_str(), body.current_page()));
        body.heading(&format!("Program: {}", program.name), '=');
        for question in questions {
            render_question(&mut body, question);
        }
    }

    let toc_pages = (toc.len() + 3).div_ceil(PAGE_HEIGHT).max(1);
    let body_offset = front.len() + toc_pages;
    front.break_page();
    front.heading("Table of Contents", '=');
    for (name, page) in &toc {
        front.line(format!("Program: {name} ....... {}", page + body_offset));
    }

    front
        .pages
        .into_iter()
        .chain(body.pages)
        .enumerate()
        .map(|(index, mut lines)| {
            lines.push(String::new());
            lines.push(format!("Page {} {}", index + 1, REPORT_TITLE));
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\u{c}\n")
}

fn answered_questions(program: &ProgramReport) -> Vec<&QuestionReport> {
    program
        .questions
        .iter()
        .filter(|q| !q.question_answers.answers.is_empty())
        .collect()
}

fn render_question(pages: &mut Pages, question: &QuestionReport) {
    pages.heading(&question.title, '-');
    let summary = &question.question_answers.summary;

    let chart: Vec<(&str, usize)> = summary.chart_entries().collect();
    if !chart.is_empty() {
        pages.line("Answers:");
        let total: usize = chart.iter().map(|(_, n)| n).sum();
        let label_width = chart.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
        for (label, count) in &chart {
            pages.line(format!(
                "  {label:<label_width$} | {} {count}",
                bar(*count, total)
            ));
        }
        pages.blank();
    }

    pages.line("Justifications:");
    for (label, texts) in summary.justification_entries() {
        pages.line(format!("Justify {label}:"));
        for text in texts {
            pages.line(format!("  {text}"));
        }
    }
    pages.blank();
}

fn bar(count: usize, total: usize) -> String {
    if total == 0 {
        return String::new();
    }
    "#".repeat(count * BAR_WIDTH / total)
}

fn center(text: &str) -> String {
    let pad = 72usize.saturating_sub(text.chars().count()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use epic_core::{
        build_organization_report, new_entity_id, Answer, AnswerBody, Program, Question,
        QuestionBody, ReportSnapshot, YesNoChoice,
    };
    use std::collections::HashSet;

    fn yes_no(user: uuid::Uuid, question: &Question, choice: YesNoChoice, text: &str) -> Answer {
        Answer::new(
            user,
            question,
            AnswerBody::YesNo {
                short_answer: Some(choice),
                justify_answer: text.to_string(),
            },
        )
        .unwrap()
    }

    fn sample_reports() -> Vec<ProgramReport> {
        let group = new_entity_id();
        let answered = Program::new("Dikes", "", group);
        let silent = Program::new("Beaches", "", group);
        let q1 = Question::new(
            "Is there a flood plan?",
            answered.id,
            QuestionBody::NationalFramework {
                description: "Plan".to_string(),
            },
        );
        let q2 = Question::new(
            "Unanswered question",
            answered.id,
            QuestionBody::NationalFramework {
                description: "".to_string(),
            },
        );
        let q3 = Question::new(
            "Silent question",
            silent.id,
            QuestionBody::KeyAgencyActions {
                description: "".to_string(),
            },
        );
        let (luke, leia) = (new_entity_id(), new_entity_id());
        let snapshot = ReportSnapshot {
            programs: vec![answered, silent],
            questions: vec![q1.clone(), q2, q3],
            answers: vec![
                yes_no(luke, &q1, YesNoChoice::Yes, "Approved in 2020"),
                yes_no(leia, &q1, YesNoChoice::No, "Still a draft"),
            ],
        };
        build_organization_report(&snapshot, &HashSet::from([luke, leia]))
    }

    fn meta() -> ReportMeta {
        ReportMeta::now("Luke")
    }

    #[test]
    fn test_document_has_front_matter() {
        let text = render_text(&sample_reports(), &meta());
        assert!(text.contains(REPORT_TITLE));
        assert!(text.contains("Abstract"));
        assert!(text.contains(REPORT_DESCRIPTION));
        assert!(text.contains("Report requested by: Luke."));
        assert!(text.contains("Report generated on:"));
        assert!(text.contains("Table of Contents"));
        assert!(text.contains("Page 1 Epic Report"));
    }

    #[test]
    fn test_skips_unanswered_questions_and_programs() {
        let text = render_text(&sample_reports(), &meta());
        assert!(text.contains("Program: Dikes"));
        assert!(text.contains("Is there a flood plan?"));
        assert!(!text.contains("Unanswered question"));
        assert!(!text.contains("Program: Beaches"));
    }

    #[test]
    fn test_chart_and_justifications() {
        let text = render_text(&sample_reports(), &meta());
        assert!(text.contains("Answers:"));
        assert!(text.contains("Justifications:"));
        assert!(text.contains("Justify Yes:"));
        assert!(text.contains("  Approved in 2020"));
        assert!(text.contains("Justify No:"));
        assert!(text.contains("  Still a draft"));
        assert!(!text.contains("no_valid_response |"));
    }

    #[test]
    fn test_toc_points_at_program_page() {
        let text = render_text(&sample_reports(), &meta());
        // title, abstract, toc, then the Dikes section
        assert!(text.contains("Program: Dikes ....... 4"));
        assert!(text.contains("Page 4 Epic Report"));
    }

    #[test]
    fn test_empty_report_still_renders() {
        let text = render_text(&[], &meta());
        assert!(text.contains(REPORT_TITLE));
        assert!(!text.contains("Program:"));
    }

    #[test]
    fn test_renderer_names_attachment() {
        let doc = TextReportRenderer.render(&sample_reports(), &meta()).unwrap();
        assert!(doc.file_name.starts_with("epic_report_"));
        assert!(doc.file_name.ends_with(".txt"));
        assert!(doc.content_type.starts_with("text/plain"));
        assert!(!doc.bytes.is_empty());
    }
}
