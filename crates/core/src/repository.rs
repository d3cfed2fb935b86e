//! The identity repository capability.
//!
//! Identity implements `UserRepository`; authentication receives an
//! `Arc<dyn UserRepository>` at construction time. Neither crate depends on the
//! other, only on this contract.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{User, UserId};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository operation error.
///
/// These are storage errors, as opposed to `DomainError` (validation,
/// invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn storage(err: impl core::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Offset pagination for list queries.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// Data-access capability over user records.
///
/// Email lookups are case-insensitive; implementations store emails as given
/// and compare lowercased.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `Conflict` if the id or email is taken.
    async fn insert(&self, user: &User) -> RepositoryResult<()>;

    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    /// Users ordered by id (creation order).
    async fn list(&self, page: Page) -> RepositoryResult<Vec<User>>;

    /// Replace an existing user. Fails with `NotFound` if absent.
    async fn update(&self, user: &User) -> RepositoryResult<()>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: UserId) -> RepositoryResult<bool>;
}

#[async_trait]
impl<R> UserRepository for Arc<R>
where
    R: UserRepository + ?Sized,
{
    async fn insert(&self, user: &User) -> RepositoryResult<()> {
        (**self).insert(user).await
    }

    async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
        (**self).find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        (**self).find_by_email(email).await
    }

    async fn list(&self, page: Page) -> RepositoryResult<Vec<User>> {
        (**self).list(page).await
    }

    async fn update(&self, user: &User) -> RepositoryResult<()> {
        (**self).update(user).await
    }

    async fn delete(&self, id: UserId) -> RepositoryResult<bool> {
        (**self).delete(id).await
    }
}
