//! Enum types for EPIC entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY TYPES
// ============================================================================

/// Entity type discriminator used in errors and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityType {
    Area,
    Group,
    Program,
    Agency,
    Question,
    Answer,
    User,
    Organization,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Area => "Area",
            EntityType::Group => "Group",
            EntityType::Program => "Program",
            EntityType::Agency => "Agency",
            EntityType::Question => "Question",
            EntityType::Answer => "Answer",
            EntityType::User => "EpicUser",
            EntityType::Organization => "EpicOrganization",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub enum_name: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.enum_name, self.value)
    }
}

impl std::error::Error for EnumParseError {}

// ============================================================================
// QUESTION KINDS
// ============================================================================

/// Concrete kind of a question. Stored next to the shared question columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum QuestionKind {
    NationalFramework,
    KeyAgencyActions,
    Evolution,
    Linkages,
}

impl QuestionKind {
    /// Every question kind, in catalog order.
    pub const ALL: [QuestionKind; 4] = [
        QuestionKind::NationalFramework,
        QuestionKind::KeyAgencyActions,
        QuestionKind::Evolution,
        QuestionKind::Linkages,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            QuestionKind::NationalFramework => "NationalFramework",
            QuestionKind::KeyAgencyActions => "KeyAgencyActions",
            QuestionKind::Evolution => "Evolution",
            QuestionKind::Linkages => "Linkages",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_lowercase().as_str() {
            "nationalframework" => Ok(QuestionKind::NationalFramework),
            "keyagencyactions" => Ok(QuestionKind::KeyAgencyActions),
            "evolution" => Ok(QuestionKind::Evolution),
            "linkages" => Ok(QuestionKind::Linkages),
            _ => Err(EnumParseError {
                enum_name: "question kind",
                value: s.to_string(),
            }),
        }
    }

    /// Name used when reporting integrity violations.
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::NationalFramework => "NationalFrameworkQuestion",
            QuestionKind::KeyAgencyActions => "KeyAgencyActionsQuestion",
            QuestionKind::Evolution => "EvolutionQuestion",
            QuestionKind::Linkages => "LinkagesQuestion",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for QuestionKind {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// ANSWER KINDS
// ============================================================================

/// Concrete kind of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AnswerKind {
    YesNo,
    SingleChoice,
    MultipleChoice,
}

impl AnswerKind {
    /// Every answer kind.
    pub const ALL: [AnswerKind; 3] = [
        AnswerKind::YesNo,
        AnswerKind::SingleChoice,
        AnswerKind::MultipleChoice,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            AnswerKind::YesNo => "YesNo",
            AnswerKind::SingleChoice => "SingleChoice",
            AnswerKind::MultipleChoice => "MultipleChoice",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_lowercase().as_str() {
            "yesno" => Ok(AnswerKind::YesNo),
            "singlechoice" => Ok(AnswerKind::SingleChoice),
            "multiplechoice" => Ok(AnswerKind::MultipleChoice),
            _ => Err(EnumParseError {
                enum_name: "answer kind",
                value: s.to_string(),
            }),
        }
    }

    /// Question kinds this answer kind may reference.
    pub fn supported_questions(&self) -> &'static [QuestionKind] {
        match self {
            AnswerKind::YesNo => &[QuestionKind::NationalFramework, QuestionKind::KeyAgencyActions],
            AnswerKind::SingleChoice => &[QuestionKind::Evolution],
            AnswerKind::MultipleChoice => &[QuestionKind::Linkages],
        }
    }

    /// The answer kind that answers a question of the given kind.
    pub fn for_question(kind: QuestionKind) -> AnswerKind {
        match kind {
            QuestionKind::NationalFramework | QuestionKind::KeyAgencyActions => AnswerKind::YesNo,
            QuestionKind::Evolution => AnswerKind::SingleChoice,
            QuestionKind::Linkages => AnswerKind::MultipleChoice,
        }
    }

    pub fn supports(&self, kind: QuestionKind) -> bool {
        self.supported_questions().contains(&kind)
    }
}

impl fmt::Display for AnswerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for AnswerKind {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// CHOICES
// ============================================================================

/// Short answer for framework questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum YesNoChoice {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
}

impl YesNoChoice {
    pub const ALL: [YesNoChoice; 2] = [YesNoChoice::Yes, YesNoChoice::No];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            YesNoChoice::Yes => "Y",
            YesNoChoice::No => "N",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.trim().to_uppercase().as_str() {
            "Y" | "YES" => Ok(YesNoChoice::Yes),
            "N" | "NO" => Ok(YesNoChoice::No),
            _ => Err(EnumParseError {
                enum_name: "yes/no choice",
                value: s.to_string(),
            }),
        }
    }

    /// Human readable label, also used as summary key.
    pub fn label(&self) -> &'static str {
        match self {
            YesNoChoice::Yes => "Yes",
            YesNoChoice::No => "No",
        }
    }
}

impl fmt::Display for YesNoChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for YesNoChoice {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Maturity stage selected for an evolution question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionChoice {
    Nascent,
    Engaged,
    Capable,
    Effective,
}

impl EvolutionChoice {
    pub const ALL: [EvolutionChoice; 4] = [
        EvolutionChoice::Nascent,
        EvolutionChoice::Engaged,
        EvolutionChoice::Capable,
        EvolutionChoice::Effective,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            EvolutionChoice::Nascent => "NASCENT",
            EvolutionChoice::Engaged => "ENGAGED",
            EvolutionChoice::Capable => "CAPABLE",
            EvolutionChoice::Effective => "EFFECTIVE",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.trim().to_uppercase().as_str() {
            "NASCENT" => Ok(EvolutionChoice::Nascent),
            "ENGAGED" => Ok(EvolutionChoice::Engaged),
            "CAPABLE" => Ok(EvolutionChoice::Capable),
            "EFFECTIVE" => Ok(EvolutionChoice::Effective),
            _ => Err(EnumParseError {
                enum_name: "evolution choice",
                value: s.to_string(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EvolutionChoice::Nascent => "Nascent",
            EvolutionChoice::Engaged => "Engaged",
            EvolutionChoice::Capable => "Capable",
            EvolutionChoice::Effective => "Effective",
        }
    }
}

impl fmt::Display for EvolutionChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl FromStr for EvolutionChoice {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// =============================================================================
// TESTS
// =============================================================================
