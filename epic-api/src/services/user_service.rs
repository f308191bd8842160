//! User Service
//!
//! Login, scoped user and organization lookups, member generation and the
//! demo seed.

use std::collections::BTreeSet;

use epic_core::{
    authorize_instance, require_admin, require_text, EntityType, EpicOrganization, EpicUser,
    InstanceAction, OrganizationId, ProgramId, StorageError, UserId, ValidationError, Visibility,
};
use epic_storage::{EpicStore, UserUpdate};

use crate::auth::{generate_jwt_token, AuthConfig};
use crate::error::{ApiError, ApiResult};
use crate::password::{generate_password, hash_password, verify_password};
use crate::types::GeneratedCredential;

const BAD_CREDENTIALS: &str = "Unable to log in with provided credentials.";

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Exchange credentials for a signed token. Any mismatch is a 400.
pub async fn authenticate(
    store: &dyn EpicStore,
    auth: &AuthConfig,
    username: &str,
    password: &str,
) -> ApiResult<String> {
    let user = store
        .user_find_by_username(username)
        .await?
        .ok_or_else(|| ApiError::invalid_input(BAD_CREDENTIALS))?;
    if !verify_password(password, &user.password_hash)? {
        tracing::info!(username = %username, "Rejected login");
        return Err(ApiError::invalid_input(BAD_CREDENTIALS));
    }
    generate_jwt_token(auth, &user)
}

// ============================================================================
// USERS
// ============================================================================

/// Users the principal may see, ordered by username.
pub async fn visible_users(store: &dyn EpicStore, principal: &EpicUser) -> ApiResult<Vec<EpicUser>> {
    let users = match Visibility::for_principal(principal) {
        Visibility::All => store.user_list().await?,
        Visibility::Organization(organization_id) => {
            store.user_list_by_organization(organization_id).await?
        }
        Visibility::Only(_) => vec![principal.clone()],
    };
    Ok(users)
}

/// A single user, reported missing when the principal cannot see it.
pub async fn visible_user(
    store: &dyn EpicStore,
    principal: &EpicUser,
    id: UserId,
    action: InstanceAction,
) -> ApiResult<EpicUser> {
    let user = store.user_get(id).await?.ok_or(StorageError::NotFound {
        entity_type: EntityType::User,
        id,
    })?;
    authorize_instance(principal, &user, EntityType::User, id, action)?;
    Ok(user)
}

/// Replace the programs the principal chose to answer.
pub async fn update_selected_programs(
    store: &dyn EpicStore,
    principal: &EpicUser,
    selected: &[ProgramId],
) -> ApiResult<EpicUser> {
    for program_id in selected {
        if store.program_get(*program_id).await?.is_none() {
            return Err(ApiError::entity_not_found(EntityType::Program.as_str(), program_id));
        }
    }
    let update = UserUpdate {
        selected_programs: Some(selected.iter().copied().collect::<BTreeSet<_>>()),
        ..UserUpdate::default()
    };
    Ok(store.user_update(principal.id, update).await?)
}

pub async fn delete_user(store: &dyn EpicStore, principal: &EpicUser, id: UserId) -> ApiResult<()> {
    require_admin(principal, "delete users")?;
    visible_user(store, principal, id, InstanceAction::Write).await?;
    store.user_delete(id).await?;
    tracing::info!(user_id = %id, "User deleted with its answers");
    Ok(())
}

// ============================================================================
// ORGANIZATIONS
// ============================================================================

/// Organizations the principal may see: all for admins, otherwise its own.
pub async fn visible_organizations(
    store: &dyn EpicStore,
    principal: &EpicUser,
) -> ApiResult<Vec<EpicOrganization>> {
    if principal.is_admin() {
        return Ok(store.organization_list().await?);
    }
    let Some(organization_id) = principal.organization_id else {
        return Ok(Vec::new());
    };
    Ok(store.organization_get(organization_id).await?.into_iter().collect())
}

pub async fn visible_organization(
    store: &dyn EpicStore,
    principal: &EpicUser,
    id: OrganizationId,
) -> ApiResult<EpicOrganization> {
    let visible = principal.is_admin() || principal.organization_id == Some(id);
    let organization = if visible {
        store.organization_get(id).await?
    } else {
        None
    };
    organization.ok_or_else(|| ApiError::entity_not_found(EntityType::Organization.as_str(), id))
}

pub async fn create_organization(
    store: &dyn EpicStore,
    principal: &EpicUser,
    name: &str,
) -> ApiResult<EpicOrganization> {
    require_admin(principal, "create organizations")?;
    let name = require_text("name", name)?;
    let organization = EpicOrganization::new(name);
    store.organization_insert(&organization).await?;
    tracing::info!(organization_id = %organization.id, name = %organization.name, "Organization created");
    Ok(organization)
}

/// Create `count` members named `<slug>_<k>` with random passwords.
///
/// Numbering continues after the highest existing suffix so repeated calls
/// never clash. All users are written in one batch; the plain passwords are
/// only returned here.
pub async fn generate_users(
    store: &dyn EpicStore,
    organization: &EpicOrganization,
    count: usize,
) -> ApiResult<Vec<GeneratedCredential>> {
    if count == 0 {
        return Err(ValidationError::InvalidValue {
            field: "count".to_string(),
            reason: "at least one user must be generated".to_string(),
        }
        .into());
    }
    let slug = organization.username_slug();
    let prefix = format!("{slug}_");
    let existing = store.user_list_by_organization(organization.id).await?;
    let start = existing
        .iter()
        .filter_map(|u| u.username.strip_prefix(&prefix))
        .filter_map(|suffix| suffix.parse::<usize>().ok())
        .max()
        .unwrap_or(0);

    let mut users = Vec::with_capacity(count);
    let mut credentials = Vec::with_capacity(count);
    for k in start + 1..=start + count {
        let username = format!("{prefix}{k}");
        let password = generate_password();
        let mut user = EpicUser::new(username.clone(), Some(organization.id));
        user.password_hash = hash_password(&password)?;
        users.push(user);
        credentials.push(GeneratedCredential { username, password });
    }

    store.users_insert_batch(&users).await?;
    tracing::info!(
        organization_id = %organization.id,
        count = count,
        "Generated organization members"
    );
    Ok(credentials)
}

// ============================================================================
// DEMO SEED
// ============================================================================

/// Create the admin account and two demo organizations with members.
///
/// Every password is the lowercase username. Existing usernames are left
/// untouched so the seed can run on every start.
pub async fn seed_demo(store: &dyn EpicStore) -> ApiResult<()> {
    let mut admin = EpicUser::new("admin", None);
    admin.is_staff = true;
    admin.is_superuser = true;
    seed_user(store, admin).await?;

    for (name, members) in [("Deltares", ["Zelda", "Ganon"]), ("Rebel Alliance", ["Luke", "Leia"])] {
        let organization = match store
            .organization_list()
            .await?
            .into_iter()
            .find(|o| o.name == name)
        {
            Some(existing) => existing,
            None => {
                let organization = EpicOrganization::new(name);
                store.organization_insert(&organization).await?;
                organization
            }
        };
        for member in members {
            seed_user(store, EpicUser::new(member, Some(organization.id))).await?;
        }
    }
    tracing::info!("Demo organizations and users seeded");
    Ok(())
}

async fn seed_user(store: &dyn EpicStore, mut user: EpicUser) -> ApiResult<()> {
    if store.user_find_by_username(&user.username).await?.is_some() {
        return Ok(());
    }
    user.password_hash = hash_password(&user.username.to_lowercase())?;
    store.user_insert(&user).await?;
    tracing::debug!(username = %user.username, "Seeded user");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::validate_jwt_token;
    use crate::error::ErrorCode;
    use epic_core::new_entity_id;
    use epic_storage::InMemoryStore;

    fn auth() -> AuthConfig {
        AuthConfig::with_secret("user-service-test-secret-with-enough-length")
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        seed_demo(&store).await.unwrap();
        store
    }

    async fn user(store: &InMemoryStore, name: &str) -> EpicUser {
        store.user_find_by_username(name).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_seed_creates_demo_accounts() {
        let store = seeded().await;
        let admin = user(&store, "admin").await;
        assert!(admin.is_staff && admin.is_superuser);
        assert_eq!(store.organization_list().await.unwrap().len(), 2);
        assert_eq!(store.user_list().await.unwrap().len(), 5);

        // second run is a no-op
        seed_demo(&store).await.unwrap();
        assert_eq!(store.user_list().await.unwrap().len(), 5);
        assert_eq!(store.organization_list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_authenticate_issues_token() {
        let store = seeded().await;
        let config = auth();
        let token = authenticate(&store, &config, "Luke", "luke").await.unwrap();
        let claims = validate_jwt_token(&config, &token).unwrap();
        assert_eq!(claims.username, "Luke");
    }

    #[tokio::test]
    async fn test_wrong_credentials_are_a_bad_request() {
        let store = seeded().await;
        let config = auth();
        let err = authenticate(&store, &config, "Luke", "vader").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        let err = authenticate(&store, &config, "Vader", "vader").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[tokio::test]
    async fn test_visible_users_by_role() {
        let store = seeded().await;
        let luke = user(&store, "Luke").await;
        let admin = user(&store, "admin").await;
        let mut leia = user(&store, "Leia").await;
        leia.is_advisor = true;

        assert_eq!(visible_users(&store, &luke).await.unwrap().len(), 1);
        assert_eq!(visible_users(&store, &leia).await.unwrap().len(), 2);
        assert_eq!(visible_users(&store, &admin).await.unwrap().len(), 5);

        let zelda = user(&store, "Zelda").await;
        let err = visible_user(&store, &luke, zelda.id, InstanceAction::Read)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);

        // The advisor lists its members but cannot open one.
        let err = visible_user(&store, &leia, luke.id, InstanceAction::Read)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        visible_user(&store, &luke, luke.id, InstanceAction::Read).await.unwrap();
        visible_user(&store, &admin, luke.id, InstanceAction::Read).await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_users_continues_numbering() {
        let store = seeded().await;
        let rebels = store
            .organization_list()
            .await
            .unwrap()
            .into_iter()
            .find(|o| o.name == "Rebel Alliance")
            .unwrap();

        let first = generate_users(&store, &rebels, 2).await.unwrap();
        let names: Vec<_> = first.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, ["rebel_alliance_1", "rebel_alliance_2"]);

        let second = generate_users(&store, &rebels, 1).await.unwrap();
        assert_eq!(second[0].username, "rebel_alliance_3");

        let generated = user(&store, "rebel_alliance_3").await;
        assert_eq!(generated.organization_id, Some(rebels.id));
        assert!(verify_password(&second[0].password, &generated.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_update_selected_programs_rejects_unknown_program() {
        let store = seeded().await;
        let luke = user(&store, "Luke").await;
        let err = update_selected_programs(&store, &luke, &[new_entity_id()])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }

    #[tokio::test]
    async fn test_organizations_are_scoped() {
        let store = seeded().await;
        let luke = user(&store, "Luke").await;
        let orgs = visible_organizations(&store, &luke).await.unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].name, "Rebel Alliance");

        let err = create_organization(&store, &luke, "Empire").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_organization_input_is_validated() {
        let store = seeded().await;
        let admin = user(&store, "admin").await;
        let err = create_organization(&store, &admin, "   ").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
        assert_eq!(err.message, "Field 'name' is required");

        let empire = create_organization(&store, &admin, " Galactic Empire ").await.unwrap();
        assert_eq!(empire.name, "Galactic Empire");
        let err = generate_users(&store, &empire, 0).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(store.user_list_by_organization(empire.id).await.unwrap().is_empty());
    }
}
