//! Report Service
//!
//! Loads one consistent snapshot of programs, questions and the answers of
//! the users a principal may see, and hands it to the report builder.

use std::collections::HashSet;

use epic_core::{build_organization_report, EpicUser, ProgramReport, ReportSnapshot, UserId};
use epic_storage::EpicStore;

use crate::error::ApiResult;
use crate::render::{RenderedDocument, ReportMeta, ReportRenderer};
use crate::services::{list_visible_answers, visible_users};

/// Per-program report over the answers visible to `principal`.
pub async fn organization_report(
    store: &dyn EpicStore,
    principal: &EpicUser,
) -> ApiResult<Vec<ProgramReport>> {
    let visible: HashSet<UserId> = visible_users(store, principal)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect();

    let snapshot = ReportSnapshot {
        programs: store.program_list().await?,
        questions: store.question_list().await?,
        answers: list_visible_answers(store, principal).await?,
    };
    tracing::debug!(
        user_id = %principal.id,
        visible_users = visible.len(),
        programs = snapshot.programs.len(),
        answers = snapshot.answers.len(),
        "Building organization report"
    );
    Ok(build_organization_report(&snapshot, &visible))
}

/// Build the report and render it as a document for `principal`.
pub async fn report_document(
    store: &dyn EpicStore,
    renderer: &dyn ReportRenderer,
    principal: &EpicUser,
) -> ApiResult<RenderedDocument> {
    let reports = organization_report(store, principal).await?;
    let document = renderer.render(&reports, &ReportMeta::now(principal.username.clone()))?;
    tracing::info!(
        user_id = %principal.id,
        bytes = document.bytes.len(),
        "Rendered report document"
    );
    Ok(document)
}
