use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use vexen_core::{RepositoryError, RepositoryResult, UserId};
use vexen_infra::MemoryTable;

use super::RoleStore;
use crate::{Permission, Role, RoleDefinition};

/// In-memory role store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    roles: MemoryTable<Role, RoleDefinition>,
    assignments: MemoryTable<(UserId, Role), DateTime<Utc>>,
    echo: bool,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_echo(echo: bool) -> Self {
        Self {
            echo,
            ..Self::default()
        }
    }

    fn echo(&self, op: &str, detail: &dyn core::fmt::Display) {
        if self.echo {
            info!(target: "vexen::rbac::store", op, %detail, "memory statement");
        }
    }

    fn role_missing(role: &Role) -> RepositoryError {
        RepositoryError::NotFound(format!("role {role}"))
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn insert_role(&self, role: &RoleDefinition) -> RepositoryResult<()> {
        self.echo("insert_role", &role.name);
        self.roles
            .insert_unique(role.name.clone(), role.clone(), |_| false)
            .map_err(|_| RepositoryError::Conflict(format!("role {}", role.name)))
    }

    async fn find_role(&self, name: &Role) -> RepositoryResult<Option<RoleDefinition>> {
        self.echo("find_role", name);
        self.roles.get(name)
    }

    async fn list_roles(&self) -> RepositoryResult<Vec<RoleDefinition>> {
        self.echo("list_roles", &"*");
        self.roles.values(0, usize::MAX)
    }

    async fn delete_role(&self, name: &Role) -> RepositoryResult<bool> {
        self.echo("delete_role", name);
        let removed = self.roles.remove(name)?;
        if removed {
            self.assignments.remove_where(|(_, role), _| role == name)?;
        }
        Ok(removed)
    }

    async fn add_permission(&self, role: &Role, permission: &Permission) -> RepositoryResult<bool> {
        self.echo("add_permission", role);
        self.roles
            .modify(role, |def| def.permissions.insert(permission.clone()))?
            .ok_or_else(|| Self::role_missing(role))
    }

    async fn remove_permission(&self, role: &Role, permission: &Permission) -> RepositoryResult<bool> {
        self.echo("remove_permission", role);
        self.roles
            .modify(role, |def| def.permissions.remove(permission))?
            .ok_or_else(|| Self::role_missing(role))
    }

    async fn assign(&self, user_id: UserId, role: &Role) -> RepositoryResult<bool> {
        self.echo("assign", &user_id);
        if self.roles.get(role)?.is_none() {
            return Err(Self::role_missing(role));
        }
        let key = (user_id, role.clone());
        if self.assignments.get(&key)?.is_some() {
            return Ok(false);
        }
        self.assignments.upsert(key.clone(), Utc::now())?;
        // delete_role may have run between the check and the write.
        if self.roles.get(role)?.is_none() {
            self.assignments.remove(&key)?;
            return Err(Self::role_missing(role));
        }
        Ok(true)
    }

    async fn unassign(&self, user_id: UserId, role: &Role) -> RepositoryResult<bool> {
        self.echo("unassign", &user_id);
        self.assignments.remove(&(user_id, role.clone()))
    }

    async fn roles_for_user(&self, user_id: UserId) -> RepositoryResult<Vec<RoleDefinition>> {
        self.echo("roles_for_user", &user_id);
        let assigned: Vec<Role> = self
            .assignments
            .keys(|(user, _)| *user == user_id)?
            .into_iter()
            .map(|(_, role)| role)
            .collect();

        let mut roles = Vec::with_capacity(assigned.len());
        for name in assigned {
            if let Some(def) = self.roles.get(&name)? {
                roles.push(def);
            }
        }
        Ok(roles)
    }
}
