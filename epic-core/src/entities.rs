//! Domain hierarchy, organizations and users

use crate::{
    AgencyId, AreaId, GroupId, OrganizationId, ProgramId, UserId, new_entity_id,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Top level of the domain hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Area {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: AreaId,
    pub name: String,
}

impl Area {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
        }
    }
}

/// A group of programs inside an area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Group {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: GroupId,
    pub name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub area_id: AreaId,
}

impl Group {
    pub fn new(name: impl Into<String>, area_id: AreaId) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            area_id,
        }
    }
}

/// A program: the unit questions are asked about.
///
/// Program names are unique ignoring case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Program {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: ProgramId,
    pub name: String,
    pub description: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub group_id: GroupId,
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub agency_ids: BTreeSet<AgencyId>,
}

/// Key under which program names are unique: trimmed and lowercased.
///
/// The PostgreSQL store indexes `lower(btrim(name))`, the same rule.
pub fn program_name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Program {
    /// The name is stored trimmed.
    pub fn new(name: impl Into<String>, description: impl Into<String>, group_id: GroupId) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into().trim().to_string(),
            description: description.into(),
            group_id,
            agency_ids: BTreeSet::new(),
        }
    }

    /// Compare names by [`program_name_key`], for uniqueness and lookups.
    pub fn name_matches(&self, name: &str) -> bool {
        program_name_key(&self.name) == program_name_key(name)
    }
}

/// An agency delivering one or more programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Agency {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: AgencyId,
    pub name: String,
}

impl Agency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EpicOrganization {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: OrganizationId,
    pub name: String,
}

impl EpicOrganization {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
        }
    }

    /// Username prefix for generated members, e.g. "Rebel Alliance" -> "rebel_alliance".
    pub fn username_slug(&self) -> String {
        let slug: String = self
            .name
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        let collapsed = slug
            .split('_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        if collapsed.is_empty() {
            "organization".to_string()
        } else {
            collapsed
        }
    }
}

/// A user answering questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicUser {
    pub id: UserId,
    pub username: String,
    /// argon2 PHC string. Never sent to clients.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_advisor: bool,
    pub organization_id: Option<OrganizationId>,
    pub selected_programs: BTreeSet<ProgramId>,
}

impl EpicUser {
    pub fn new(username: impl Into<String>, organization_id: Option<OrganizationId>) -> Self {
        Self {
            id: new_entity_id(),
            username: username.into(),
            password_hash: String::new(),
            is_staff: false,
            is_superuser: false,
            is_advisor: false,
            organization_id,
            selected_programs: BTreeSet::new(),
        }
    }

    /// Staff or superuser.
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}
