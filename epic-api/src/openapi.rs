//! OpenAPI Specification for the EPIC API
//!
//! The document is generated by utoipa from the route annotations and the
//! schema derives on the wire types.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::services::JsonRows;
use crate::types::*;

use crate::routes::{
    admin, agencies, answers, areas, groups, health, organizations, programs, questions, token,
    users,
};

use epic_core::{
    Agency, Answer, AnswerBody, AnswerKind, Area, EntityType, EpicOrganization, EvolutionChoice,
    Group, Program, ProgramReport, Progress, Question, QuestionAnswers, QuestionBody,
    QuestionKind, QuestionReport, YesNoChoice,
};

/// OpenAPI document for the EPIC API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "EPIC API",
        version = "0.1.0",
        description = "Assessment questionnaires on national frameworks, agency actions, program evolution and linkages, with organization reports",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local Development")
    ),
    tags(
        (name = "Health", description = "Liveness check"),
        (name = "Auth", description = "Token exchange"),
        (name = "Areas", description = "Top level of the program catalog"),
        (name = "Groups", description = "Program groups within an area"),
        (name = "Programs", description = "Programs, their questions and answering progress"),
        (name = "Agencies", description = "Agencies and the programs they run"),
        (name = "Questions", description = "Questions of the four kinds"),
        (name = "Answers", description = "Answers scoped to the caller's visibility"),
        (name = "Users", description = "Users and their selected programs"),
        (name = "Organizations", description = "Organizations, generated members and reports"),
        (name = "Admin", description = "Bulk imports and linkages generation")
    ),
    paths(
        // === Public Routes ===
        health::ping,
        token::obtain_token,

        // === Catalog Routes ===
        areas::list_areas,
        areas::get_area,
        areas::delete_area,
        groups::list_groups,
        groups::get_group,
        groups::delete_group,
        programs::list_programs,
        programs::get_program,
        programs::delete_program,
        programs::list_program_questions,
        programs::get_program_progress,
        agencies::list_agencies,
        agencies::get_agency,
        agencies::delete_agency,

        // === Question and Answer Routes ===
        questions::list_questions,
        questions::get_question,
        questions::get_question_answer,
        answers::list_answers,
        answers::submit_answer,
        answers::get_answer,
        answers::update_answer,
        answers::delete_answer,

        // === User and Organization Routes ===
        users::list_users,
        users::get_me,
        users::update_me,
        users::get_user,
        users::delete_user,
        organizations::list_organizations,
        organizations::create_organization,
        organizations::get_organization,
        organizations::generate_users,
        organizations::get_report,
        organizations::get_report_document,

        // === Admin Routes ===
        admin::import_domain,
        admin::import_agencies,
        admin::import_national_framework,
        admin::import_key_agency_actions,
        admin::import_evolution,
        admin::generate_linkages,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Request and Response Types ===
            TokenRequest, TokenResponse, UserResponse, UpdateSelectedProgramsRequest,
            CreateOrganizationRequest, GenerateUsersRequest, GeneratedCredential,
            GenerateUsersResponse, SubmitAnswerRequest, ImportSummary,
            GenerateLinkagesResponse, PingResponse, JsonRows,

            // === Domain Types (from epic-core) ===
            EntityType, QuestionKind, AnswerKind, YesNoChoice, EvolutionChoice,
            Area, Group, Program, Agency, EpicOrganization,
            Question, QuestionBody, Answer, AnswerBody, Progress,
            ProgramReport, QuestionReport, QuestionAnswers
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token from POST /api/v1/token-auth"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "EPIC API");

        let tags = openapi
            .tags
            .as_ref()
            .ok_or_else(|| "OpenAPI tags missing".to_string())?;
        assert_eq!(tags.len(), 11);

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("AnswerBody"));
        Ok(())
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("EPIC API"));
        assert!(json.contains("\"bearer_auth\""));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();
        for path in [
            "/api/v1/health/ping",
            "/api/v1/token-auth",
            "/api/v1/programs/{id}/progress",
            "/api/v1/questions/{id}/answer",
            "/api/v1/answers/{id}",
            "/api/v1/users/me",
            "/api/v1/organizations/report-document",
            "/api/v1/admin/import/evolution",
            "/api/v1/admin/generate-linkages",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_answer_kind_mismatch_documented_as_422() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| e.to_string())?;
        let doc: serde_json::Value = serde_json::from_str(&json).map_err(|e| e.to_string())?;
        for (path, method) in [("/api/v1/answers", "post"), ("/api/v1/answers/{id}", "patch")] {
            let responses = &doc["paths"][path][method]["responses"];
            assert!(responses.get("422").is_some(), "{method} {path} lacks 422");
            assert!(responses.get("400").is_none(), "{method} {path} still lists 400");
        }
        Ok(())
    }
}
