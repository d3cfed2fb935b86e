//! Postgres-backed user repository.
//!
//! Emails are unique case-insensitively through a `LOWER(email)` index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use vexen_core::{Page, RepositoryError, RepositoryResult, User, UserId, UserRepository};
use vexen_infra::postgres::{page_bound, repository_error};

/// DDL applied at subsystem startup.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS vexen_users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        name TEXT NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS vexen_users_email_key ON vexen_users (LOWER(email))",
];

const COLUMNS: &str = "id, email, name, active, created_at, updated_at";

/// Postgres-backed `UserRepository`.
///
/// Uses the SQLx connection pool which is thread-safe (Arc + Send + Sync).
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        active: row.try_get("active")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert(&self, user: &User) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO vexen_users (id, email, name, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(repository_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM vexen_users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(repository_error)?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(repository_error)
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM vexen_users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(repository_error)?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(repository_error)
    }

    #[instrument(skip(self))]
    async fn list(&self, page: Page) -> RepositoryResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM vexen_users ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(page_bound(page.limit))
        .bind(page_bound(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(repository_error)?;
        rows.iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(repository_error)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: &User) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE vexen_users SET email = $2, name = $3, active = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.active)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(repository_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: UserId) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM vexen_users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;
        Ok(result.rows_affected() > 0)
    }
}
