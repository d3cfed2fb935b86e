//! Role management and permission checks.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use vexen_core::{DomainError, RepositoryError, UserId};

use crate::authorize::{self, AuthorizationExplanation, AuthzError};
use crate::{CreateRoleRequest, Permission, Role, RoleDefinition, RoleStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RbacError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),
}

pub type RbacResult<T> = Result<T, RbacError>;

/// Store-level `NotFound`/`Conflict` become domain errors so callers see one
/// shape regardless of backend.
fn lift(err: RepositoryError) -> RbacError {
    match err {
        RepositoryError::NotFound(what) => DomainError::NotFound(what).into(),
        RepositoryError::Conflict(what) => DomainError::Conflict(what).into(),
        other => other.into(),
    }
}

/// Role/permission service.
#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn RoleStore>,
}

impl core::fmt::Debug for RoleService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleService").finish_non_exhaustive()
    }
}

impl RoleService {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, request), fields(role = %request.name))]
    pub async fn create(&self, request: CreateRoleRequest) -> RbacResult<RoleDefinition> {
        let role = request.into_definition(Utc::now())?;
        self.store.insert_role(&role).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                DomainError::conflict(format!("role '{}' already exists", role.name)).into()
            }
            other => lift(other),
        })?;
        info!(role = %role.name, "role created");
        Ok(role)
    }

    pub async fn get(&self, name: &str) -> RbacResult<RoleDefinition> {
        let role = Role::parse(name)?;
        self.store
            .find_role(&role)
            .await
            .map_err(lift)?
            .ok_or_else(|| DomainError::not_found(format!("role {role}")).into())
    }

    pub async fn list(&self) -> RbacResult<Vec<RoleDefinition>> {
        self.store.list_roles().await.map_err(lift)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> RbacResult<()> {
        let role = Role::parse(name)?;
        if !self.store.delete_role(&role).await.map_err(lift)? {
            return Err(DomainError::not_found(format!("role {role}")).into());
        }
        info!(%role, "role deleted");
        Ok(())
    }

    /// Returns the updated role.
    #[instrument(skip(self))]
    pub async fn grant_permission(&self, role: &str, permission: &str) -> RbacResult<RoleDefinition> {
        let role = Role::parse(role)?;
        let permission = Permission::parse(permission)?;
        if self.store.add_permission(&role, &permission).await.map_err(lift)? {
            info!(%role, %permission, "permission granted");
        }
        self.get(role.as_str()).await
    }

    #[instrument(skip(self))]
    pub async fn revoke_permission(&self, role: &str, permission: &str) -> RbacResult<RoleDefinition> {
        let role = Role::parse(role)?;
        let permission = Permission::parse(permission)?;
        if self.store.remove_permission(&role, &permission).await.map_err(lift)? {
            info!(%role, %permission, "permission revoked");
        }
        self.get(role.as_str()).await
    }

    /// Assign `role` to `user_id`. Assigning twice is a no-op.
    #[instrument(skip(self))]
    pub async fn assign_role(&self, user_id: UserId, role: &str) -> RbacResult<()> {
        let role = Role::parse(role)?;
        if self.store.assign(user_id, &role).await.map_err(lift)? {
            info!(%user_id, %role, "role assigned");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn revoke_role(&self, user_id: UserId, role: &str) -> RbacResult<()> {
        let role = Role::parse(role)?;
        if !self.store.unassign(user_id, &role).await.map_err(lift)? {
            return Err(DomainError::not_found(format!("role {role} for user {user_id}")).into());
        }
        info!(%user_id, %role, "role revoked");
        Ok(())
    }

    pub async fn roles_for_user(&self, user_id: UserId) -> RbacResult<Vec<RoleDefinition>> {
        self.store.roles_for_user(user_id).await.map_err(lift)
    }

    /// Union of the permissions of every role assigned to `user_id`.
    pub async fn permissions_for_user(&self, user_id: UserId) -> RbacResult<BTreeSet<Permission>> {
        Ok(self
            .roles_for_user(user_id)
            .await?
            .into_iter()
            .flat_map(|r| r.permissions)
            .collect())
    }

    pub async fn has_permission(&self, user_id: UserId, permission: &str) -> RbacResult<bool> {
        match self.authorize(user_id, permission).await {
            Ok(()) => Ok(true),
            Err(RbacError::Forbidden(_)) => Ok(false),
            Err(other) => Err(other),
        }
    }

    /// `Ok` if any assigned role grants `permission`, `Forbidden` otherwise.
    /// Validation and storage failures are returned as-is.
    #[instrument(skip(self))]
    pub async fn authorize(&self, user_id: UserId, permission: &str) -> RbacResult<()> {
        let required = Permission::parse(permission)?;
        let roles = self.roles_for_user(user_id).await?;
        let decision = authorize::authorize(user_id, &roles, &required);
        debug!(%user_id, permission = %required, granted = decision.is_ok(), "authorization decision");
        Ok(decision?)
    }

    pub async fn explain(&self, user_id: UserId, permission: &str) -> RbacResult<AuthorizationExplanation> {
        let required = Permission::parse(permission)?;
        let roles = self.roles_for_user(user_id).await?;
        Ok(authorize::explain(user_id, &roles, &required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryRoleStore;

    fn service() -> RoleService {
        RoleService::new(Arc::new(InMemoryRoleStore::new()))
    }

    #[tokio::test]
    async fn create_rejects_duplicates_as_conflict() {
        let roles = service();
        roles.create(CreateRoleRequest::new("admin")).await.unwrap();
        let err = roles.create(CreateRoleRequest::new("admin")).await.unwrap_err();
        assert!(matches!(err, RbacError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn invalid_names_are_validation_errors() {
        let roles = service();
        let err = roles.create(CreateRoleRequest::new("  ")).await.unwrap_err();
        assert!(matches!(err, RbacError::Domain(DomainError::Validation(_))));
        let err = roles.authorize(UserId::new(), "two words").await.unwrap_err();
        assert!(matches!(err, RbacError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn granted_permissions_flow_to_assigned_users() {
        let roles = service();
        let user = UserId::new();
        roles.create(CreateRoleRequest::new("editor")).await.unwrap();
        roles.assign_role(user, "editor").await.unwrap();

        assert!(!roles.has_permission(user, "docs:write").await.unwrap());
        let editor = roles.grant_permission("editor", "docs:write").await.unwrap();
        assert!(editor.permissions.contains(&Permission::new("docs:write")));
        assert!(roles.has_permission(user, "docs:write").await.unwrap());

        roles.revoke_permission("editor", "docs:write").await.unwrap();
        assert!(matches!(
            roles.authorize(user, "docs:write").await,
            Err(RbacError::Forbidden(AuthzError::Forbidden { .. }))
        ));
    }

    #[tokio::test]
    async fn wildcard_role_grants_everything() {
        let roles = service();
        let user = UserId::new();
        roles
            .create(CreateRoleRequest::new("root").with_permission("*"))
            .await
            .unwrap();
        roles.assign_role(user, "root").await.unwrap();

        assert!(roles.has_permission(user, "anything:at-all").await.unwrap());
        let explanation = roles.explain(user, "anything:at-all").await.unwrap();
        assert!(explanation.granted);
        assert_eq!(explanation.granting_roles, vec!["root".to_string()]);
    }

    #[tokio::test]
    async fn permissions_for_user_is_the_union_of_roles() {
        let roles = service();
        let user = UserId::new();
        roles
            .create(CreateRoleRequest::new("a").with_permission("x").with_permission("y"))
            .await
            .unwrap();
        roles
            .create(CreateRoleRequest::new("b").with_permission("y").with_permission("z"))
            .await
            .unwrap();
        roles.assign_role(user, "a").await.unwrap();
        roles.assign_role(user, "b").await.unwrap();

        let perms: Vec<_> = roles
            .permissions_for_user(user)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(perms, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn assigning_unknown_role_is_not_found() {
        let roles = service();
        let err = roles.assign_role(UserId::new(), "ghost").await.unwrap_err();
        assert!(matches!(err, RbacError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn revoking_an_unassigned_role_is_not_found() {
        let roles = service();
        let user = UserId::new();
        roles.create(CreateRoleRequest::new("viewer")).await.unwrap();
        roles.assign_role(user, "viewer").await.unwrap();
        roles.revoke_role(user, "viewer").await.unwrap();
        assert!(matches!(
            roles.revoke_role(user, "viewer").await,
            Err(RbacError::Domain(DomainError::NotFound(_)))
        ));
    }
}
