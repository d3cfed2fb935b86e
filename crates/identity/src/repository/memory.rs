use async_trait::async_trait;
use tracing::info;

use vexen_core::{Page, RepositoryError, RepositoryResult, User, UserId, UserRepository};
use vexen_infra::MemoryTable;

/// In-memory user repository.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: MemoryTable<UserId, User>,
    echo: bool,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every operation at `info` (mirrors SQL echo for the memory backend).
    pub fn with_echo(echo: bool) -> Self {
        Self {
            users: MemoryTable::new(),
            echo,
        }
    }

    fn echo(&self, op: &str, detail: &dyn core::fmt::Display) {
        if self.echo {
            info!(target: "vexen::identity::store", op, %detail, "memory statement");
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: &User) -> RepositoryResult<()> {
        self.echo("insert", &user.id);
        self.users
            .insert_unique(user.id, user.clone(), |u| u.email.eq_ignore_ascii_case(&user.email))
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    RepositoryError::Conflict(format!("user {} / {}", user.id, user.email))
                }
                other => other,
            })
    }

    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        self.echo("find_by_id", &id);
        self.users.get(&id)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.echo("find_by_email", &email);
        self.users.find(|u| u.email.eq_ignore_ascii_case(email))
    }

    async fn list(&self, page: Page) -> RepositoryResult<Vec<User>> {
        self.echo("list", &page.limit);
        self.users.values(page.offset, page.limit)
    }

    async fn update(&self, user: &User) -> RepositoryResult<()> {
        self.echo("update", &user.id);
        let replaced = self
            .users
            .replace_unique(&user.id, user.clone(), |u| u.email.eq_ignore_ascii_case(&user.email))
            .map_err(|_| RepositoryError::Conflict(format!("email {}", user.email)))?;
        if replaced {
            Ok(())
        } else {
            Err(RepositoryError::NotFound(format!("user {}", user.id)))
        }
    }

    async fn delete(&self, id: UserId) -> RepositoryResult<bool> {
        self.echo("delete", &id);
        self.users.remove(&id)
    }
}
