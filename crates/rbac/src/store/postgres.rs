//! Postgres-backed role store.
//!
//! Permissions and assignments reference roles with `ON DELETE CASCADE`, so
//! deleting a role is a single statement.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use vexen_core::{RepositoryError, RepositoryResult, UserId};
use vexen_infra::postgres::repository_error;

use super::RoleStore;
use crate::{Permission, Role, RoleDefinition};

/// DDL applied at subsystem startup.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS vexen_roles (
        name TEXT PRIMARY KEY,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vexen_role_permissions (
        role TEXT NOT NULL REFERENCES vexen_roles (name) ON DELETE CASCADE,
        permission TEXT NOT NULL,
        PRIMARY KEY (role, permission)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vexen_user_roles (
        user_id UUID NOT NULL,
        role TEXT NOT NULL REFERENCES vexen_roles (name) ON DELETE CASCADE,
        assigned_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (user_id, role)
    )
    "#,
];

const SELECT_ROLE: &str = r#"
    SELECT r.name, r.description, r.created_at,
           COALESCE(array_agg(p.permission) FILTER (WHERE p.permission IS NOT NULL), '{}') AS permissions
    FROM vexen_roles r
    LEFT JOIN vexen_role_permissions p ON p.role = r.name
"#;

/// Postgres-backed `RoleStore`.
#[derive(Debug, Clone)]
pub struct PostgresRoleStore {
    pool: PgPool,
}

impl PostgresRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn role_exists(&self, role: &Role) -> RepositoryResult<()> {
        let found = sqlx::query("SELECT 1 FROM vexen_roles WHERE name = $1")
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(repository_error)?;
        match found {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound(format!("role {role}"))),
        }
    }
}

fn role_from_row(row: &PgRow) -> Result<RoleDefinition, sqlx::Error> {
    let permissions: Vec<String> = row.try_get("permissions")?;
    Ok(RoleDefinition {
        name: Role::new(row.try_get::<String, _>("name")?),
        description: row.try_get("description")?,
        permissions: permissions.into_iter().map(Permission::new).collect::<BTreeSet<_>>(),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl RoleStore for PostgresRoleStore {
    #[instrument(skip(self, role), fields(role = %role.name))]
    async fn insert_role(&self, role: &RoleDefinition) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await.map_err(repository_error)?;
        sqlx::query("INSERT INTO vexen_roles (name, description, created_at) VALUES ($1, $2, $3)")
            .bind(role.name.as_str())
            .bind(role.description.as_deref())
            .bind(role.created_at)
            .execute(&mut *tx)
            .await
            .map_err(repository_error)?;
        for permission in &role.permissions {
            sqlx::query("INSERT INTO vexen_role_permissions (role, permission) VALUES ($1, $2)")
                .bind(role.name.as_str())
                .bind(permission.as_str())
                .execute(&mut *tx)
                .await
                .map_err(repository_error)?;
        }
        tx.commit().await.map_err(repository_error)
    }

    #[instrument(skip(self))]
    async fn find_role(&self, name: &Role) -> RepositoryResult<Option<RoleDefinition>> {
        let row = sqlx::query(&format!("{SELECT_ROLE} WHERE r.name = $1 GROUP BY r.name"))
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(repository_error)?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(repository_error)
    }

    #[instrument(skip(self))]
    async fn list_roles(&self) -> RepositoryResult<Vec<RoleDefinition>> {
        let rows = sqlx::query(&format!("{SELECT_ROLE} GROUP BY r.name ORDER BY r.name"))
            .fetch_all(&self.pool)
            .await
            .map_err(repository_error)?;
        rows.iter()
            .map(role_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(repository_error)
    }

    #[instrument(skip(self))]
    async fn delete_role(&self, name: &Role) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM vexen_roles WHERE name = $1")
            .bind(name.as_str())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn add_permission(&self, role: &Role, permission: &Permission) -> RepositoryResult<bool> {
        self.role_exists(role).await?;
        let result = sqlx::query(
            "INSERT INTO vexen_role_permissions (role, permission) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role.as_str())
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(repository_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn remove_permission(&self, role: &Role, permission: &Permission) -> RepositoryResult<bool> {
        self.role_exists(role).await?;
        let result = sqlx::query("DELETE FROM vexen_role_permissions WHERE role = $1 AND permission = $2")
            .bind(role.as_str())
            .bind(permission.as_str())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn assign(&self, user_id: UserId, role: &Role) -> RepositoryResult<bool> {
        self.role_exists(role).await?;
        let result = sqlx::query(
            "INSERT INTO vexen_user_roles (user_id, role, assigned_at) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(repository_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn unassign(&self, user_id: UserId, role: &Role) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM vexen_user_roles WHERE user_id = $1 AND role = $2")
            .bind(user_id.as_uuid())
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn roles_for_user(&self, user_id: UserId) -> RepositoryResult<Vec<RoleDefinition>> {
        let rows = sqlx::query(&format!(
            "{SELECT_ROLE} JOIN vexen_user_roles ur ON ur.role = r.name \
             WHERE ur.user_id = $1 GROUP BY r.name ORDER BY r.name"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(repository_error)?;
        rows.iter()
            .map(role_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(repository_error)
    }
}
