//! Access scoping
//!
//! Which users' data a principal may see, and what happens when a principal
//! touches a single record it does not own.

use crate::{AccessError, EntityType, EpicUser, OrganizationId, UserId};
use uuid::Uuid;

/// The set of users whose data a principal may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Staff and superusers.
    All,
    /// Advisors see every member of their organization.
    Organization(OrganizationId),
    /// Everyone else sees only themself.
    Only(UserId),
}

impl Visibility {
    pub fn for_principal(principal: &EpicUser) -> Self {
        if principal.is_admin() {
            return Visibility::All;
        }
        match (principal.is_advisor, principal.organization_id) {
            (true, Some(org)) => Visibility::Organization(org),
            _ => Visibility::Only(principal.id),
        }
    }

    pub fn admits(&self, user: &EpicUser) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Organization(org) => user.organization_id == Some(*org),
            Visibility::Only(id) => user.id == *id,
        }
    }

    /// Keep only the visible users.
    pub fn filter_users<'a>(&self, users: impl IntoIterator<Item = &'a EpicUser>) -> Vec<&'a EpicUser> {
        users.into_iter().filter(|u| self.admits(u)).collect()
    }
}

/// What a principal wants to do with a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceAction {
    Read,
    Write,
}

impl InstanceAction {
    fn verb(&self) -> &'static str {
        match self {
            InstanceAction::Read => "read",
            InstanceAction::Write => "modify",
        }
    }
}

/// Decide access to one record owned by `owner`.
///
/// Admins and the owner may do anything. Anyone else gets "not found" for a
/// read, or for a record whose owner they cannot see, and "forbidden" for a
/// write on a visible record.
pub fn authorize_instance(
    principal: &EpicUser,
    owner: &EpicUser,
    entity_type: EntityType,
    id: Uuid,
    action: InstanceAction,
) -> Result<(), AccessError> {
    if principal.is_admin() || principal.id == owner.id {
        return Ok(());
    }
    if !Visibility::for_principal(principal).admits(owner) {
        return Err(AccessError::NotFound { entity_type, id });
    }
    match action {
        InstanceAction::Read => Err(AccessError::NotFound { entity_type, id }),
        InstanceAction::Write => Err(AccessError::Forbidden {
            entity_type,
            id,
            action: action.verb().to_string(),
        }),
    }
}

/// Fail unless the principal is staff or superuser.
pub fn require_admin(principal: &EpicUser, action: &str) -> Result<(), AccessError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AccessError::AdminRequired {
            action: action.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::new_entity_id;

    fn member(name: &str, org: Option<OrganizationId>) -> EpicUser {
        EpicUser::new(name, org)
    }

    #[test]
    fn test_visibility_per_role() {
        let org = new_entity_id();
        let mut admin = member("admin", None);
        admin.is_staff = true;
        let mut advisor = member("advisor", Some(org));
        advisor.is_advisor = true;
        let plain = member("plain", Some(org));

        assert_eq!(Visibility::for_principal(&admin), Visibility::All);
        assert_eq!(Visibility::for_principal(&advisor), Visibility::Organization(org));
        assert_eq!(Visibility::for_principal(&plain), Visibility::Only(plain.id));
    }

    #[test]
    fn test_advisor_without_organization_sees_self_only() {
        let mut advisor = member("lonely", None);
        advisor.is_advisor = true;
        assert_eq!(Visibility::for_principal(&advisor), Visibility::Only(advisor.id));
    }

    #[test]
    fn test_filter_users_by_organization() {
        let org_a = new_entity_id();
        let org_b = new_entity_id();
        let users = vec![
            member("u1", Some(org_a)),
            member("u2", Some(org_a)),
            member("u3", Some(org_b)),
            member("u4", None),
        ];
        let visible = Visibility::Organization(org_a).filter_users(&users);
        let names: Vec<&str> = visible.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["u1", "u2"]);
        assert_eq!(Visibility::All.filter_users(&users).len(), 4);
    }

    #[test]
    fn test_invisible_record_is_not_found_for_read_and_write() {
        let stranger = member("stranger", Some(new_entity_id()));
        let owner = member("owner", Some(new_entity_id()));
        for action in [InstanceAction::Read, InstanceAction::Write] {
            let err = authorize_instance(&stranger, &owner, EntityType::Answer, Uuid::nil(), action)
                .unwrap_err();
            assert!(matches!(err, AccessError::NotFound { .. }));
        }
    }

    #[test]
    fn test_advisor_cannot_open_member_records() {
        let org = new_entity_id();
        let mut advisor = member("advisor", Some(org));
        advisor.is_advisor = true;
        let owner = member("owner", Some(org));

        let err = authorize_instance(&advisor, &owner, EntityType::Answer, Uuid::nil(), InstanceAction::Read)
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound { .. }));
        let err = authorize_instance(&advisor, &owner, EntityType::Answer, Uuid::nil(), InstanceAction::Write)
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden { .. }));
    }

    #[test]
    fn test_owner_and_admin_may_read_and_write() {
        let owner = member("owner", None);
        let mut admin = member("admin", None);
        admin.is_superuser = true;
        for action in [InstanceAction::Read, InstanceAction::Write] {
            assert!(authorize_instance(&owner, &owner, EntityType::Answer, Uuid::nil(), action).is_ok());
            assert!(authorize_instance(&admin, &owner, EntityType::Answer, Uuid::nil(), action).is_ok());
        }
    }

    #[test]
    fn test_require_admin() {
        let mut user = member("u", None);
        assert!(require_admin(&user, "import").is_err());
        user.is_staff = true;
        assert!(require_admin(&user, "import").is_ok());
    }
}
