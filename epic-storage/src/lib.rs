//! EPIC Storage - Repository Trait and In-Memory Implementation
//!
//! Defines the repository every EPIC store implements, with each cascade
//! written out, plus the answer gate operations built on top of it. The
//! PostgreSQL implementation lives in epic-api.

pub mod answers;
pub mod memory;

pub use answers::{
    create_or_get_answer, resolve_answer, resolve_question, save_answer, submit_answer,
};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use epic_core::{
    Agency, AgencyId, Answer, AnswerId, Area, AreaId, EpicOrganization, EpicResult, EpicUser,
    Group, GroupId, OrganizationId, Program, ProgramId, Question, QuestionId, QuestionKind,
    UserId,
};
use std::collections::BTreeSet;

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Update payload for users.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// Programs the user chose to answer
    pub selected_programs: Option<BTreeSet<ProgramId>>,
    /// New argon2 hash
    pub password_hash: Option<String>,
    pub is_advisor: Option<bool>,
}

/// A complete replacement of the area/group/program hierarchy.
#[derive(Debug, Clone, Default)]
pub struct DomainTree {
    pub areas: Vec<Area>,
    pub groups: Vec<Group>,
    pub programs: Vec<Program>,
}

/// A complete replacement of the agency list and its program links.
#[derive(Debug, Clone, Default)]
pub struct AgencySet {
    pub agencies: Vec<Agency>,
    pub links: Vec<(AgencyId, ProgramId)>,
}

// ============================================================================
// REPOSITORY TRAIT
// ============================================================================

/// Repository for EPIC entities.
///
/// Deletes cascade exactly as listed on each method. Bulk `replace_*`
/// operations are all-or-nothing. Inserting a second row for a unique key
/// fails with `StorageError::Duplicate`.
#[async_trait]
pub trait EpicStore: Send + Sync {
    // === Areas ===

    async fn area_insert(&self, area: &Area) -> EpicResult<()>;
    async fn area_get(&self, id: AreaId) -> EpicResult<Option<Area>>;
    async fn area_list(&self) -> EpicResult<Vec<Area>>;
    /// Cascades to groups, programs, questions and answers.
    async fn area_delete(&self, id: AreaId) -> EpicResult<()>;

    // === Groups ===

    async fn group_insert(&self, group: &Group) -> EpicResult<()>;
    async fn group_get(&self, id: GroupId) -> EpicResult<Option<Group>>;
    async fn group_list(&self) -> EpicResult<Vec<Group>>;
    async fn group_list_by_area(&self, area_id: AreaId) -> EpicResult<Vec<Group>>;
    /// Cascades to programs, questions and answers.
    async fn group_delete(&self, id: GroupId) -> EpicResult<()>;

    // === Programs ===

    /// Fails with `Duplicate` when the name is taken ignoring case.
    async fn program_insert(&self, program: &Program) -> EpicResult<()>;
    async fn program_get(&self, id: ProgramId) -> EpicResult<Option<Program>>;
    async fn program_find_by_name(&self, name: &str) -> EpicResult<Option<Program>>;
    async fn program_list(&self) -> EpicResult<Vec<Program>>;
    async fn program_list_by_group(&self, group_id: GroupId) -> EpicResult<Vec<Program>>;
    /// Cascades to questions and answers, and drops the program from every
    /// linkages selection and user selection.
    async fn program_delete(&self, id: ProgramId) -> EpicResult<()>;

    // === Agencies ===

    async fn agency_insert(&self, agency: &Agency) -> EpicResult<()>;
    async fn agency_get(&self, id: AgencyId) -> EpicResult<Option<Agency>>;
    async fn agency_list(&self) -> EpicResult<Vec<Agency>>;
    async fn agency_link_program(&self, agency_id: AgencyId, program_id: ProgramId) -> EpicResult<()>;
    /// Detaches the agency from its programs. Programs survive.
    async fn agency_delete(&self, id: AgencyId) -> EpicResult<()>;

    // === Questions ===

    /// Fails with `Duplicate` on a `(title, program)` clash or a second
    /// linkages question for the program.
    async fn question_insert(&self, question: &Question) -> EpicResult<()>;
    async fn question_get(&self, id: QuestionId) -> EpicResult<Option<Question>>;
    async fn question_list(&self) -> EpicResult<Vec<Question>>;
    async fn question_list_by_program(&self, program_id: ProgramId) -> EpicResult<Vec<Question>>;
    async fn question_list_by_kind(&self, kind: QuestionKind) -> EpicResult<Vec<Question>>;
    /// Cascades to answers.
    async fn question_delete(&self, id: QuestionId) -> EpicResult<()>;

    // === Answers ===

    /// Fails with `Duplicate` when `(user, question)` already has an answer
    /// and with `UnsupportedQuestionType` when the kinds do not match.
    async fn answer_insert(&self, answer: &Answer) -> EpicResult<()>;
    async fn answer_get(&self, id: AnswerId) -> EpicResult<Option<Answer>>;
    async fn answer_find(&self, user_id: UserId, question_id: QuestionId) -> EpicResult<Option<Answer>>;
    async fn answer_list(&self) -> EpicResult<Vec<Answer>>;
    async fn answer_list_by_question(&self, question_id: QuestionId) -> EpicResult<Vec<Answer>>;
    async fn answer_list_by_user(&self, user_id: UserId) -> EpicResult<Vec<Answer>>;
    /// Replace the kind-specific fields of a stored answer.
    async fn answer_update(&self, answer: &Answer) -> EpicResult<()>;
    async fn answer_delete(&self, id: AnswerId) -> EpicResult<()>;

    // === Organizations ===

    async fn organization_insert(&self, organization: &EpicOrganization) -> EpicResult<()>;
    async fn organization_get(&self, id: OrganizationId) -> EpicResult<Option<EpicOrganization>>;
    async fn organization_list(&self) -> EpicResult<Vec<EpicOrganization>>;
    /// Cascades to member users and their answers.
    async fn organization_delete(&self, id: OrganizationId) -> EpicResult<()>;

    // === Users ===

    /// Fails with `Duplicate` when the username is taken.
    async fn user_insert(&self, user: &EpicUser) -> EpicResult<()>;
    /// Insert every user or none.
    async fn users_insert_batch(&self, users: &[EpicUser]) -> EpicResult<()>;
    async fn user_get(&self, id: UserId) -> EpicResult<Option<EpicUser>>;
    async fn user_find_by_username(&self, username: &str) -> EpicResult<Option<EpicUser>>;
    async fn user_list(&self) -> EpicResult<Vec<EpicUser>>;
    async fn user_list_by_organization(&self, organization_id: OrganizationId) -> EpicResult<Vec<EpicUser>>;
    async fn user_update(&self, id: UserId, update: UserUpdate) -> EpicResult<EpicUser>;
    /// Cascades to the user's answers.
    async fn user_delete(&self, id: UserId) -> EpicResult<()>;

    // === Bulk replacement ===

    /// Delete every area (with the full cascade) and insert `tree`.
    async fn replace_domain(&self, tree: &DomainTree) -> EpicResult<()>;
    /// Delete every agency and insert `set` with its program links.
    async fn replace_agencies(&self, set: &AgencySet) -> EpicResult<()>;
    /// Delete every question of `kind` (with answers) and insert `questions`.
    async fn replace_questions(&self, kind: QuestionKind, questions: &[Question]) -> EpicResult<()>;
    /// Delete every linkages question and create one per program.
    async fn regenerate_linkages(&self) -> EpicResult<Vec<Question>>;
}
