//! Credential storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vexen_core::{RepositoryResult, UserId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;

/// Password credentials for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: UserId,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Tokens carrying an older version are rejected.
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credentials {
    pub fn new(user_id: UserId, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            password_hash,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fails with `Conflict` if the user already has credentials.
    async fn insert(&self, credentials: &Credentials) -> RepositoryResult<()>;

    async fn find(&self, user_id: UserId) -> RepositoryResult<Option<Credentials>>;

    /// Fails with `NotFound` if the user has no credentials.
    async fn update(&self, credentials: &Credentials) -> RepositoryResult<()>;

    async fn delete(&self, user_id: UserId) -> RepositoryResult<bool>;
}
