//! Postgres-backed credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use vexen_core::{RepositoryError, RepositoryResult, UserId};
use vexen_infra::postgres::repository_error;

use super::{CredentialStore, Credentials};

/// DDL applied at subsystem startup.
///
/// `user_id` refers to identity's users but carries no foreign key: the two
/// subsystems may live in different databases.
pub const SCHEMA: &[&str] = &[r#"
    CREATE TABLE IF NOT EXISTS vexen_credentials (
        user_id UUID PRIMARY KEY,
        password_hash TEXT NOT NULL,
        version BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#];

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn credentials_from_row(row: &PgRow) -> Result<Credentials, sqlx::Error> {
    let version: i64 = row.try_get("version")?;
    Ok(Credentials {
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        password_hash: row.try_get("password_hash")?,
        version: u32::try_from(version).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    #[instrument(skip(self, credentials), fields(user_id = %credentials.user_id))]
    async fn insert(&self, credentials: &Credentials) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO vexen_credentials (user_id, password_hash, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(credentials.user_id.as_uuid())
        .bind(&credentials.password_hash)
        .bind(i64::from(credentials.version))
        .bind(credentials.created_at)
        .bind(credentials.updated_at)
        .execute(&self.pool)
        .await
        .map_err(repository_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, user_id: UserId) -> RepositoryResult<Option<Credentials>> {
        let row = sqlx::query(
            "SELECT user_id, password_hash, version, created_at, updated_at \
             FROM vexen_credentials WHERE user_id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(repository_error)?;
        row.as_ref()
            .map(credentials_from_row)
            .transpose()
            .map_err(repository_error)
    }

    #[instrument(skip(self, credentials), fields(user_id = %credentials.user_id))]
    async fn update(&self, credentials: &Credentials) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE vexen_credentials SET password_hash = $2, version = $3, updated_at = $4 \
             WHERE user_id = $1",
        )
        .bind(credentials.user_id.as_uuid())
        .bind(&credentials.password_hash)
        .bind(i64::from(credentials.version))
        .bind(credentials.updated_at)
        .execute(&self.pool)
        .await
        .map_err(repository_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "credentials for user {}",
                credentials.user_id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, user_id: UserId) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM vexen_credentials WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(repository_error)?;
        Ok(result.rows_affected() > 0)
    }
}
