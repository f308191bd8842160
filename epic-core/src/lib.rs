//! EPIC Core - Domain Types
//!
//! Entities, the question/answer sum types and the pure rules layered on
//! them: the compatibility table, validity, summaries, progress, report
//! assembly and access scoping. No I/O happens in this crate.

mod access;
mod answer;
mod entities;
mod enums;
mod error;
mod identity;
mod progress;
mod question;
mod report;
mod summary;

pub use access::{authorize_instance, require_admin, InstanceAction, Visibility};
pub use answer::{check_compatibility, Answer, AnswerBody};
pub use entities::{program_name_key, Agency, Area, EpicOrganization, EpicUser, Group, Program};
pub use enums::{AnswerKind, EntityType, EnumParseError, EvolutionChoice, QuestionKind, YesNoChoice};
pub use error::{
    require_text, AccessError, EpicError, EpicResult, ImportError, IntegrityError, StorageError,
    ValidationError,
};
pub use identity::{
    new_entity_id, AgencyId, AnswerId, AreaId, EntityId, GroupId, OrganizationId, ProgramId,
    QuestionId, Timestamp, UserId,
};
pub use progress::{compute_progress, Progress};
pub use question::{Question, QuestionBody, DEFAULT_EVOLUTION_TITLE, LINKAGES_TITLE};
pub use report::{
    build_organization_report, build_program_report, ProgramReport, QuestionAnswers,
    QuestionReport, ReportSnapshot,
};
pub use summary::{detailed_summary, DetailedSummary, SummaryValue, JUSTIFY_SUFFIX, NO_VALID_RESPONSE};
