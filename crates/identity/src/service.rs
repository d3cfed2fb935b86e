//! User business operations.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument};

use vexen_core::{DomainError, Page, RepositoryError, User, UserId, UserRepository};

use crate::dto::{normalize_email, normalize_name, CreateUserRequest, UpdateUserRequest};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type UserServiceResult<T> = Result<T, UserServiceError>;

/// User management service (create, read, update, activation, delete).
#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl core::fmt::Debug for UserService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreateUserRequest) -> UserServiceResult<User> {
        let (email, name) = request.normalized()?;

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict(format!("email '{email}' is already registered")).into());
        }

        let user = User::new(email, name, Utc::now());
        self.repository.insert(&user).await?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn get(&self, id: UserId) -> UserServiceResult<User> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user {id}")).into())
    }

    pub async fn get_by_email(&self, email: &str) -> UserServiceResult<User> {
        self.repository
            .find_by_email(email.trim())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user with email '{}'", email.trim())).into())
    }

    pub async fn list(&self, page: Page) -> UserServiceResult<Vec<User>> {
        Ok(self.repository.list(page).await?)
    }

    #[instrument(skip(self, request))]
    pub async fn update(&self, id: UserId, request: UpdateUserRequest) -> UserServiceResult<User> {
        let mut user = self.get(id).await?;
        if request.is_empty() {
            return Ok(user);
        }

        if let Some(email) = request.email.as_deref() {
            let email = normalize_email(email)?;
            if let Some(other) = self.repository.find_by_email(&email).await? {
                if other.id != id {
                    return Err(DomainError::conflict(format!("email '{email}' is already registered")).into());
                }
            }
            user.email = email;
        }
        if let Some(name) = request.name.as_deref() {
            user.name = normalize_name(name)?;
        }

        user.updated_at = Utc::now();
        self.repository.update(&user).await?;
        info!(user_id = %id, "user updated");
        Ok(user)
    }

    /// Mark the user inactive; inactive users cannot log in.
    pub async fn deactivate(&self, id: UserId) -> UserServiceResult<User> {
        self.set_active(id, false).await
    }

    pub async fn activate(&self, id: UserId) -> UserServiceResult<User> {
        self.set_active(id, true).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: UserId) -> UserServiceResult<()> {
        if !self.repository.delete(id).await? {
            return Err(DomainError::not_found(format!("user {id}")).into());
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn set_active(&self, id: UserId, active: bool) -> UserServiceResult<User> {
        let mut user = self.get(id).await?;
        if user.active == active {
            return Ok(user);
        }
        user.active = active;
        user.updated_at = Utc::now();
        self.repository.update(&user).await?;
        info!(user_id = %id, active, "user activation changed");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryUserRepository;

    fn service() -> UserService {
        UserService::new(Arc::new(InMemoryUserRepository::new()))
    }

    #[tokio::test]
    async fn create_normalizes_and_persists() {
        let users = service();
        let user = users
            .create(CreateUserRequest::new(" Capo@Example.com ", "Capo"))
            .await
            .unwrap();

        assert_eq!(user.email, "capo@example.com");
        assert!(user.active);
        assert_eq!(users.get(user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let users = service();
        users
            .create(CreateUserRequest::new("capo@example.com", "Capo"))
            .await
            .unwrap();

        let err = users
            .create(CreateUserRequest::new("CAPO@example.com", "Other"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_storage() {
        let users = service();
        let err = users
            .create(CreateUserRequest::new("", "capo"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::Domain(DomainError::Validation(_))));
        assert!(users.list(Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let users = service();
        let user = users
            .create(CreateUserRequest::new("bob@example.com", "Bob"))
            .await
            .unwrap();

        let updated = users
            .update(
                user.id,
                UpdateUserRequest {
                    name: Some("Robert".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Robert");
        assert_eq!(updated.email, "bob@example.com");
        assert!(updated.updated_at >= user.updated_at);
    }

    #[tokio::test]
    async fn update_to_taken_email_is_a_conflict() {
        let users = service();
        users
            .create(CreateUserRequest::new("a@example.com", "A"))
            .await
            .unwrap();
        let b = users
            .create(CreateUserRequest::new("b@example.com", "B"))
            .await
            .unwrap();

        let err = users
            .update(
                b.id,
                UpdateUserRequest {
                    email: Some("A@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn deactivate_then_activate() {
        let users = service();
        let user = users
            .create(CreateUserRequest::new("carol@example.com", "Carol"))
            .await
            .unwrap();

        assert!(!users.deactivate(user.id).await.unwrap().active);
        assert!(!users.get_by_email("carol@example.com").await.unwrap().active);
        assert!(users.activate(user.id).await.unwrap().active);
    }

    #[tokio::test]
    async fn delete_missing_user_is_not_found() {
        let users = service();
        let err = users.delete(UserId::new()).await.unwrap_err();
        assert!(matches!(err, UserServiceError::Domain(DomainError::NotFound(_))));
    }
}
