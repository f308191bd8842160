//! Error Types for the EPIC API
//!
//! `ApiError` is the single error body returned by every endpoint. Domain
//! errors from `epic-core` convert into it with the status codes clients
//! rely on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use epic_core::{
    AccessError, EpicError, ImportError, IntegrityError, StorageError, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODES
// ============================================================================

/// Machine-readable error kind, sent as `code` in SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No credentials were sent
    Unauthorized,
    /// Admin-only action, or a write on someone else's record
    Forbidden,
    /// Token does not verify or names a deleted user
    InvalidToken,
    TokenExpired,

    ValidationFailed,
    InvalidInput,
    MissingField,
    /// Answer kind cannot reference the question kind
    UnsupportedQuestionType,

    /// Record does not exist or is hidden from the caller
    EntityNotFound,
    /// A unique name or `(user, question)` pair is taken
    EntityAlreadyExists,

    InternalError,
    DatabaseError,
    /// Pool closed or out of connections
    ServiceUnavailable,
    Timeout,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized | ErrorCode::InvalidToken | ErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::ValidationFailed | ErrorCode::InvalidInput | ErrorCode::MissingField => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::UnsupportedQuestionType => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,
            ErrorCode::EntityAlreadyExists => StatusCode::CONFLICT,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// ERROR BODY
// ============================================================================

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    /// Structured context, such as the supported question types or the
    /// names an import could not resolve
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        Self::new(ErrorCode::TokenExpired, "Token has expired, log in again")
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::MissingField, format!("Field '{field}' is required"))
    }

    /// 404 for a record that is absent or hidden from the caller.
    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::EntityNotFound, format!("{entity_type} {id} not found"))
    }

    pub fn entity_already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EntityAlreadyExists, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(ErrorCode::Timeout, format!("{operation} did not finish in time"))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<EpicError> for ApiError {
    fn from(err: EpicError) -> Self {
        match err {
            EpicError::Integrity(IntegrityError::UnsupportedQuestionType {
                question_type,
                supported,
            }) => {
                let message = IntegrityError::UnsupportedQuestionType {
                    question_type,
                    supported: supported.clone(),
                }
                .to_string();
                tracing::warn!(%question_type, "Rejected answer for unsupported question type");
                let supported_types: Vec<&str> = supported.iter().map(|k| k.type_name()).collect();
                ApiError::new(ErrorCode::UnsupportedQuestionType, message).with_details(
                    serde_json::json!({
                        "question_type": question_type.type_name(),
                        "supported_types": supported_types,
                    }),
                )
            }
            EpicError::Integrity(err @ IntegrityError::ResolutionFailed { .. }) => {
                tracing::error!(error = %err, "Subtype resolution failed");
                ApiError::internal_error("Stored record could not be resolved")
            }
            EpicError::Import(ImportError::MissingReferencedEntities { entity_type, names }) => {
                ApiError::validation_failed(format!(
                    "Import references {} unknown {} entries",
                    names.len(),
                    entity_type
                ))
                .with_details(serde_json::json!({
                    "entity_type": entity_type.as_str(),
                    "missing": names,
                }))
            }
            EpicError::Import(err @ ImportError::InvalidRow { .. }) => {
                ApiError::validation_failed(err.to_string())
            }
            EpicError::Access(AccessError::NotFound { entity_type, id }) => {
                ApiError::entity_not_found(entity_type.as_str(), id)
            }
            EpicError::Access(err @ AccessError::Forbidden { .. })
            | EpicError::Access(err @ AccessError::AdminRequired { .. }) => {
                ApiError::forbidden(err.to_string())
            }
            EpicError::Validation(ValidationError::RequiredFieldMissing { field }) => {
                ApiError::missing_field(&field)
            }
            EpicError::Validation(err @ ValidationError::InvalidValue { .. }) => {
                ApiError::invalid_input(err.to_string())
            }
            EpicError::Storage(StorageError::NotFound { entity_type, id }) => {
                ApiError::entity_not_found(entity_type.as_str(), id)
            }
            EpicError::Storage(err @ StorageError::Duplicate { .. }) => {
                ApiError::entity_already_exists(err.to_string())
            }
            EpicError::Storage(err) => {
                tracing::error!(error = %err, "Storage failure");
                ApiError::database_error(err.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        EpicError::from(err).into()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        EpicError::from(err).into()
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        EpicError::from(err).into()
    }
}

impl From<IntegrityError> for ApiError {
    fn from(err: IntegrityError) -> Self {
        EpicError::from(err).into()
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        EpicError::from(err).into()
    }
}

// ============================================================================
// CONVERSIONS FROM DRIVER ERRORS
// ============================================================================

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!(error = ?err, "PostgreSQL query failed");
        ApiError::database_error("Database operation failed")
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!(error = ?err, "Could not check out a connection");
        match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                ApiError::service_unavailable("No database connection available")
            }
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::token_expired(),
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {err}")),
        }
    }
}

// Both only come from client-supplied text.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Malformed JSON: {err}"))
    }
}

impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        ApiError::invalid_input(format!("Malformed id: {err}"))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
