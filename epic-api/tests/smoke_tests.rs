//! End-to-end smoke tests against PostgreSQL
//!
//! Run with `--features db-tests` and the `EPIC_DB_*` variables pointing at
//! a scratch database. The catalog is replaced on every run.

#![cfg(feature = "db-tests")]

use epic_api::services::{answer_for_question, organization_report, program_progress, submit_principal_answer};
use epic_api::ApiResult;
use epic_core::{AnswerBody, EpicUser, YesNoChoice};
use epic_storage::{AgencySet, DomainTree, EpicStore};
use epic_test_utils::fixtures::{load_organization, organization_with_members, DomainFixture};

#[path = "support/db.rs"]
mod test_db_support;

#[tokio::test]
async fn smoke_test_answer_and_report() -> ApiResult<()> {
    let store = test_db_support::test_pg_store();
    store.migrate().await?;
    store.replace_domain(&DomainTree::default()).await?;
    store.replace_agencies(&AgencySet::default()).await?;

    let domain = DomainFixture::new();
    domain.load(&store).await?;

    let suffix = uuid::Uuid::now_v7().simple().to_string();
    let (organization, mut members) = organization_with_members(
        &format!("Smoke {suffix}"),
        &[&format!("smoke_a_{suffix}"), &format!("smoke_b_{suffix}")],
    );
    members[1].is_advisor = true;
    load_organization(&store, &organization, &members).await?;
    let member: &EpicUser = &members[0];
    let advisor: &EpicUser = &members[1];

    // Get-or-create returns the same row twice.
    let first = answer_for_question(&store, member, domain.national_framework.id).await?;
    let second = answer_for_question(&store, member, domain.national_framework.id).await?;
    assert_eq!(first.id, second.id);

    let answer = submit_principal_answer(
        &store,
        member,
        domain.national_framework.id,
        AnswerBody::YesNo {
            short_answer: Some(YesNoChoice::Yes),
            justify_answer: "Set by law".to_string(),
        },
    )
    .await?;
    assert_eq!(answer.id, first.id);

    let progress = program_progress(&store, domain.program().id, member).await?;
    assert_eq!(progress.progress, 0.25);

    let report = organization_report(&store, advisor).await?;
    let answers: usize = report
        .iter()
        .flat_map(|p| &p.questions)
        .map(|q| q.question_answers.answers.len())
        .sum();
    assert_eq!(answers, 1);

    for user in &members {
        store.user_delete(user.id).await?;
    }
    store.organization_delete(organization.id).await?;
    Ok(())
}
