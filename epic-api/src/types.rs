//! API Request and Response Types
//!
//! Wire types that are not domain entities themselves. Entities from
//! `epic-core` are returned as they are, except users, whose password hash
//! stays on the server.

use epic_core::{
    AnswerBody, AreaId, EpicUser, GroupId, OrganizationId, ProgramId, QuestionId, QuestionKind,
    UserId,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// AUTH TYPES
// ============================================================================

/// Credentials exchanged for a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenResponse {
    /// Bearer token for the `Authorization` header
    pub token: String,
}

// ============================================================================
// USER TYPES
// ============================================================================

/// A user as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: UserId,
    pub username: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_advisor: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub organization_id: Option<OrganizationId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub selected_programs: Vec<ProgramId>,
}

impl From<&EpicUser> for UserResponse {
    fn from(user: &EpicUser) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            is_advisor: user.is_advisor,
            organization_id: user.organization_id,
            selected_programs: user.selected_programs.iter().copied().collect(),
        }
    }
}

impl From<EpicUser> for UserResponse {
    fn from(user: EpicUser) -> Self {
        Self::from(&user)
    }
}

/// Replace the programs the caller chose to answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateSelectedProgramsRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub selected_programs: Vec<ProgramId>,
}

// ============================================================================
// ORGANIZATION TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateOrganizationRequest {
    pub name: String,
}

/// How many members to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GenerateUsersRequest {
    pub count: usize,
}

/// A generated login. The password is only ever returned here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GeneratedCredential {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GenerateUsersResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub organization_id: OrganizationId,
    pub users: Vec<GeneratedCredential>,
}

// ============================================================================
// CATALOG TYPES
// ============================================================================

/// Query string of group listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GroupListQuery {
    pub area_id: Option<AreaId>,
}

/// Query string of program listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProgramListQuery {
    pub group_id: Option<GroupId>,
}

// ============================================================================
// QUESTION AND ANSWER TYPES
// ============================================================================

/// Query string of question listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QuestionListQuery {
    /// Only questions of this kind
    pub kind: Option<QuestionKind>,
}

/// Submit an answer for the caller.
///
/// The body fields sit next to `question_id`, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubmitAnswerRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub question_id: QuestionId,
    #[serde(flatten)]
    pub body: AnswerBody,
}

// ============================================================================
// ADMIN TYPES
// ============================================================================

/// Outcome of a bulk import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImportSummary {
    /// Rows turned into records
    pub imported: usize,
    /// Rows skipped because every cell was blank
    pub skipped_blank: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GenerateLinkagesResponse {
    pub created: usize,
}

// ============================================================================
// HEALTH TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PingResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use epic_core::YesNoChoice;

    #[test]
    fn test_user_response_drops_password_hash() {
        let mut user = EpicUser::new("leia", None);
        user.password_hash = "$argon2id$v=19$secret".to_string();
        let json = serde_json::to_string(&UserResponse::from(&user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("leia"));
    }

    #[test]
    fn test_submit_answer_request_reads_flat_body() {
        let question_id = epic_core::new_entity_id();
        let json = serde_json::json!({
            "question_id": question_id,
            "kind": "YesNo",
            "short_answer": "Y",
            "justify_answer": "Laboris proident",
        });
        let request: SubmitAnswerRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.question_id, question_id);
        assert_eq!(
            request.body,
            AnswerBody::YesNo {
                short_answer: Some(YesNoChoice::Yes),
                justify_answer: "Laboris proident".to_string(),
            }
        );
    }

    #[test]
    fn test_question_list_query_kind() {
        let query: QuestionListQuery =
            serde_json::from_value(serde_json::json!({"kind": "Evolution"})).unwrap();
        assert_eq!(query.kind, Some(QuestionKind::Evolution));
    }
}
