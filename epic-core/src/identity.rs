//! Identity types for EPIC entities

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub type AreaId = EntityId;
pub type GroupId = EntityId;
pub type ProgramId = EntityId;
pub type AgencyId = EntityId;
pub type QuestionId = EntityId;
pub type AnswerId = EntityId;
pub type UserId = EntityId;
pub type OrganizationId = EntityId;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
