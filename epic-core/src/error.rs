//! Error types for EPIC operations

use crate::{EntityType, QuestionKind};
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Duplicate {entity_type}: {reason}")]
    Duplicate { entity_type: EntityType, reason: String },

    #[error("Insert failed for {entity_type}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: Uuid,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Client input rejected before anything is written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    RequiredFieldMissing { field: String },

    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// The trimmed value, or `RequiredFieldMissing` when nothing is left.
pub fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(value)
}

/// Data integrity errors raised by the answer gate and subtype resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Question type `{}` not allowed. Supported types: [{}].", .question_type.type_name(), format_kinds(.supported))]
    UnsupportedQuestionType {
        question_type: QuestionKind,
        supported: Vec<QuestionKind>,
    },

    #[error("No concrete {entity_type} owns id {id}: {reason}")]
    ResolutionFailed {
        entity_type: EntityType,
        id: Uuid,
        reason: String,
    },
}

fn format_kinds(kinds: &[QuestionKind]) -> String {
    kinds
        .iter()
        .map(|k| format!("`{}`", k.type_name()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bulk import errors. Imports are rejected whole.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("Missing {entity_type} references: {}", .names.join(", "))]
    MissingReferencedEntities {
        entity_type: EntityType,
        names: Vec<String>,
    },

    #[error("Invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

/// Access denials. The variant decides how the denial is surfaced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("{entity_type} with id {id} not found")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Not allowed to {action} {entity_type} with id {id}")]
    Forbidden {
        entity_type: EntityType,
        id: Uuid,
        action: String,
    },

    #[error("Administrator rights required to {action}")]
    AdminRequired { action: String },
}

/// Master error type for all EPIC errors.
#[derive(Debug, Clone, Error)]
pub enum EpicError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),
}

/// Result type alias for EPIC operations.
pub type EpicResult<T> = Result<T, EpicError>;

// =============================================================================
// TESTS
// =============================================================================
