//! Question catalog
//!
//! Every question shares `{id, title, program_id}` and carries exactly one
//! concrete body. The body variant is the discriminant, so resolving a
//! question to its concrete kind never needs a search across tables.

use crate::{new_entity_id, ProgramId, QuestionId, QuestionKind};
use serde::{Deserialize, Serialize};

/// Title given to every generated linkages question.
pub const LINKAGES_TITLE: &str = "Please select three programs that will help you deliver better results in your program if you could have better collaboration? ";

/// Title used for evolution rows imported without a dimension.
pub const DEFAULT_EVOLUTION_TITLE: &str = "Default dimension";

/// Kind-specific question fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind")]
pub enum QuestionBody {
    NationalFramework {
        description: String,
    },
    KeyAgencyActions {
        description: String,
    },
    /// Prompt text for each maturity stage. These are not user answers.
    Evolution {
        nascent_description: String,
        engaged_description: String,
        capable_description: String,
        effective_description: String,
    },
    /// "Pick up to three programs".
    Linkages,
}

impl QuestionBody {
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionBody::NationalFramework { .. } => QuestionKind::NationalFramework,
            QuestionBody::KeyAgencyActions { .. } => QuestionKind::KeyAgencyActions,
            QuestionBody::Evolution { .. } => QuestionKind::Evolution,
            QuestionBody::Linkages => QuestionKind::Linkages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Question {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: QuestionId,
    pub title: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub program_id: ProgramId,
    #[serde(flatten)]
    pub body: QuestionBody,
}

impl Question {
    pub fn new(title: impl Into<String>, program_id: ProgramId, body: QuestionBody) -> Self {
        Self {
            id: new_entity_id(),
            title: title.into(),
            program_id,
            body,
        }
    }

    /// The single linkages question of a program.
    pub fn linkages(program_id: ProgramId) -> Self {
        Self::new(LINKAGES_TITLE, program_id, QuestionBody::Linkages)
    }

    pub fn kind(&self) -> QuestionKind {
        self.body.kind()
    }

    /// Free-text description for framework style questions.
    pub fn description(&self) -> Option<&str> {
        match &self.body {
            QuestionBody::NationalFramework { description }
            | QuestionBody::KeyAgencyActions { description } => Some(description),
            _ => None,
        }
    }

    /// Whether `self` and `other` cannot both exist.
    ///
    /// `(title, program)` is unique, and a program has at most one linkages
    /// question whatever its title.
    pub fn conflicts_with(&self, other: &Question) -> bool {
        if self.id == other.id || self.program_id != other.program_id {
            return false;
        }
        let both_linkages =
            self.kind() == QuestionKind::Linkages && other.kind() == QuestionKind::Linkages;
        both_linkages || self.title == other.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framework(title: &str, program_id: ProgramId) -> Question {
        Question::new(
            title,
            program_id,
            QuestionBody::NationalFramework {
                description: "Is there a national framework?".to_string(),
            },
        )
    }

    #[test]
    fn test_kind_follows_body() {
        let program_id = new_entity_id();
        assert_eq!(framework("a", program_id).kind(), QuestionKind::NationalFramework);
        assert_eq!(Question::linkages(program_id).kind(), QuestionKind::Linkages);
    }

    #[test]
    fn test_same_title_same_program_conflicts() {
        let program_id = new_entity_id();
        let a = framework("Policy", program_id);
        let b = framework("Policy", program_id);
        assert!(a.conflicts_with(&b));
        assert!(!a.conflicts_with(&a));
    }

    #[test]
    fn test_same_title_other_program_does_not_conflict() {
        let a = framework("Policy", new_entity_id());
        let b = framework("Policy", new_entity_id());
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn test_second_linkages_conflicts_even_with_other_title() {
        let program_id = new_entity_id();
        let first = Question::linkages(program_id);
        let mut second = Question::linkages(program_id);
        second.title = "Another linkage".to_string();
        assert!(first.conflicts_with(&second));
    }

    #[test]
    fn test_serialized_question_carries_kind_tag() {
        let question = framework("Policy", new_entity_id());
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["kind"], "NationalFramework");
        assert_eq!(json["description"], "Is there a national framework?");

        let linkages = serde_json::to_value(Question::linkages(new_entity_id())).unwrap();
        assert_eq!(linkages["kind"], "Linkages");
        assert_eq!(linkages["title"], LINKAGES_TITLE);
    }

    #[test]
    fn test_description_only_for_framework_kinds() {
        let program_id = new_entity_id();
        assert!(framework("a", program_id).description().is_some());
        assert!(Question::linkages(program_id).description().is_none());
    }
}
