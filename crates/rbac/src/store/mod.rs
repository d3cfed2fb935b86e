//! Role storage.

use async_trait::async_trait;

use vexen_core::{RepositoryResult, UserId};

use crate::{Permission, Role, RoleDefinition};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRoleStore;
pub use postgres::PostgresRoleStore;

/// Persistence for roles, their permissions and user assignments.
///
/// Deleting a role removes its assignments.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Fails with `Conflict` if the name is taken.
    async fn insert_role(&self, role: &RoleDefinition) -> RepositoryResult<()>;

    async fn find_role(&self, name: &Role) -> RepositoryResult<Option<RoleDefinition>>;

    /// All roles ordered by name.
    async fn list_roles(&self) -> RepositoryResult<Vec<RoleDefinition>>;

    async fn delete_role(&self, name: &Role) -> RepositoryResult<bool>;

    /// Returns whether the permission was newly added. `NotFound` if the role
    /// does not exist.
    async fn add_permission(&self, role: &Role, permission: &Permission) -> RepositoryResult<bool>;

    async fn remove_permission(&self, role: &Role, permission: &Permission) -> RepositoryResult<bool>;

    /// Returns whether the assignment is new. `NotFound` if the role does not
    /// exist.
    async fn assign(&self, user_id: UserId, role: &Role) -> RepositoryResult<bool>;

    async fn unassign(&self, user_id: UserId, role: &Role) -> RepositoryResult<bool>;

    /// Roles assigned to `user_id`, ordered by name.
    async fn roles_for_user(&self, user_id: UserId) -> RepositoryResult<Vec<RoleDefinition>>;
}
