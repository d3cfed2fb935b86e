use async_trait::async_trait;
use tracing::info;

use vexen_core::{RepositoryError, RepositoryResult, UserId};
use vexen_infra::MemoryTable;

use super::{CredentialStore, Credentials};

/// In-memory credential store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: MemoryTable<UserId, Credentials>,
    echo: bool,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_echo(echo: bool) -> Self {
        Self {
            echo,
            ..Self::default()
        }
    }

    fn echo(&self, op: &str, user_id: UserId) {
        if self.echo {
            info!(target: "vexen::auth::store", op, %user_id, "memory statement");
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert(&self, credentials: &Credentials) -> RepositoryResult<()> {
        self.echo("insert", credentials.user_id);
        self.credentials
            .insert_unique(credentials.user_id, credentials.clone(), |_| false)
            .map_err(|_| RepositoryError::Conflict(format!("credentials for user {}", credentials.user_id)))
    }

    async fn find(&self, user_id: UserId) -> RepositoryResult<Option<Credentials>> {
        self.echo("find", user_id);
        self.credentials.get(&user_id)
    }

    async fn update(&self, credentials: &Credentials) -> RepositoryResult<()> {
        self.echo("update", credentials.user_id);
        if !self.credentials.replace(&credentials.user_id, credentials.clone())? {
            return Err(RepositoryError::NotFound(format!(
                "credentials for user {}",
                credentials.user_id
            )));
        }
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> RepositoryResult<bool> {
        self.echo("delete", user_id);
        self.credentials.remove(&user_id)
    }
}
