//! Registration, login and token operations.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use vexen_core::{DomainError, RepositoryError, User, UserId, UserRepository};

use crate::claims::{TokenClaims, TokenType, TokenValidationError};
use crate::password::PasswordService;
use crate::store::{CredentialStore, Credentials};
use crate::tokens::{TokenError, TokenIssuer, TokenPair};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Unknown email, missing credentials or wrong password; callers cannot
    /// tell which.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user {0} is inactive")]
    InactiveUser(UserId),

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Claims(TokenValidationError::Expired) => Self::TokenExpired,
            TokenError::Signing(e) => Self::Signing(e.to_string()),
            other => Self::InvalidToken(other.to_string()),
        }
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Hashing(err.to_string())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication service.
///
/// Reads users through the injected `UserRepository`; owns credentials.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    credentials: Arc<dyn CredentialStore>,
    passwords: PasswordService,
    tokens: TokenIssuer,
}

impl core::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthService")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        credentials: Arc<dyn CredentialStore>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            users,
            credentials,
            passwords: PasswordService::new(),
            tokens,
        }
    }

    async fn active_user(&self, user_id: UserId) -> AuthResult<User> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
        if !user.active {
            return Err(AuthError::InactiveUser(user_id));
        }
        Ok(user)
    }

    async fn credentials_for(&self, user_id: UserId) -> AuthResult<Credentials> {
        self.credentials
            .find(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("credentials for user {user_id}")).into())
    }

    /// Set the initial password for an existing, active user.
    #[instrument(skip(self, password))]
    pub async fn register(&self, user_id: UserId, password: &str) -> AuthResult<()> {
        self.active_user(user_id).await?;
        self.passwords.check_policy(password)?;

        let hash = self.passwords.hash_password(password)?;
        let credentials = Credentials::new(user_id, hash, Utc::now());
        self.credentials.insert(&credentials).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                AuthError::from(DomainError::conflict(format!("user {user_id} is already registered")))
            }
            other => other.into(),
        })?;
        info!(%user_id, "credentials registered");
        Ok(())
    }

    /// Exchange email and password for a token pair.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let Some(user) = self.users.find_by_email(email.trim()).await? else {
            self.passwords.verify_decoy(password)?;
            return Err(AuthError::InvalidCredentials);
        };
        let Some(credentials) = self.credentials.find(user.id).await? else {
            self.passwords.verify_decoy(password)?;
            return Err(AuthError::InvalidCredentials);
        };
        if !self.passwords.verify_password(password, &credentials.password_hash)? {
            warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.active {
            return Err(AuthError::InactiveUser(user.id));
        }

        let pair = self.tokens.issue_pair(&user, credentials.version, Utc::now())?;
        info!(user_id = %user.id, "login succeeded");
        Ok(pair)
    }

    /// Exchange a refresh token for a fresh pair.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let now = Utc::now();
        let claims = self.tokens.decode(refresh_token, TokenType::Refresh, now)?;
        let (user, credentials) = self.current_subject(&claims).await?;
        let pair = self.tokens.issue_pair(&user, credentials.version, now)?;
        info!(user_id = %user.id, "tokens refreshed");
        Ok(pair)
    }

    /// Decode and check an access token; returns its claims.
    pub async fn verify_access_token(&self, access_token: &str) -> AuthResult<TokenClaims> {
        let claims = self.tokens.decode(access_token, TokenType::Access, Utc::now())?;
        self.current_subject(&claims).await?;
        Ok(claims)
    }

    /// Replace the password after checking the current one. Outstanding
    /// tokens stop validating.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(&self, user_id: UserId, current: &str, new: &str) -> AuthResult<()> {
        let mut credentials = self.credentials_for(user_id).await?;
        if !self.passwords.verify_password(current, &credentials.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        self.passwords.check_policy(new)?;

        credentials.password_hash = self.passwords.hash_password(new)?;
        credentials.version = credentials.version.wrapping_add(1);
        credentials.updated_at = Utc::now();
        self.credentials.update(&credentials).await?;
        info!(%user_id, "password changed");
        Ok(())
    }

    /// Remove the user's credentials. The identity record is untouched.
    #[instrument(skip(self))]
    pub async fn unregister(&self, user_id: UserId) -> AuthResult<()> {
        if !self.credentials.delete(user_id).await? {
            return Err(DomainError::not_found(format!("credentials for user {user_id}")).into());
        }
        info!(%user_id, "credentials removed");
        Ok(())
    }

    /// The token's subject must still be active with matching credentials.
    async fn current_subject(&self, claims: &TokenClaims) -> AuthResult<(User, Credentials)> {
        let user = match self.active_user(claims.sub).await {
            Err(AuthError::Domain(DomainError::NotFound(_))) => {
                return Err(AuthError::InvalidToken("subject no longer exists".to_string()));
            }
            other => other?,
        };
        let credentials = match self.credentials.find(user.id).await? {
            Some(c) if c.version == claims.ver => c,
            _ => return Err(AuthError::InvalidToken("token has been revoked".to_string())),
        };
        Ok((user, credentials))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use jsonwebtoken::Algorithm;
    use secrecy::SecretString;

    use vexen_core::{Page, RepositoryResult};

    use super::*;
    use crate::store::InMemoryCredentialStore;

    /// Minimal user repository; identity's real one lives in another crate.
    #[derive(Default)]
    struct Users(std::sync::Mutex<Vec<User>>);

    #[async_trait::async_trait]
    impl UserRepository for Users {
        async fn insert(&self, user: &User) -> RepositoryResult<()> {
            self.0.lock().unwrap().push(user.clone());
            Ok(())
        }
        async fn find_by_id(&self, id: UserId) -> RepositoryResult<Option<User>> {
            Ok(self.0.lock().unwrap().iter().find(|u| u.id == id).cloned())
        }
        async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
            Ok(self.0.lock().unwrap().iter().find(|u| u.email == email).cloned())
        }
        async fn list(&self, _page: Page) -> RepositoryResult<Vec<User>> {
            Ok(self.0.lock().unwrap().clone())
        }
        async fn update(&self, user: &User) -> RepositoryResult<()> {
            let mut users = self.0.lock().unwrap();
            if let Some(slot) = users.iter_mut().find(|u| u.id == user.id) {
                *slot = user.clone();
            }
            Ok(())
        }
        async fn delete(&self, id: UserId) -> RepositoryResult<bool> {
            let mut users = self.0.lock().unwrap();
            let before = users.len();
            users.retain(|u| u.id != id);
            Ok(users.len() < before)
        }
    }

    async fn setup() -> (AuthService, Arc<Users>, User) {
        let users = Arc::new(Users::default());
        let user = User::new("grace@example.com", "Grace", Utc::now());
        users.insert(&user).await.unwrap();
        let tokens = TokenIssuer::new(
            &SecretString::new("test-secret".to_string()),
            Algorithm::HS256,
            Duration::minutes(30),
            Duration::days(7),
        );
        let service = AuthService::new(users.clone(), Arc::new(InMemoryCredentialStore::new()), tokens);
        (service, users, user)
    }

    #[tokio::test]
    async fn register_then_login_yields_verifiable_tokens() {
        let (auth, _, user) = setup().await;
        auth.register(user.id, "password123").await.unwrap();

        let pair = auth.login("grace@example.com", "password123").await.unwrap();
        let claims = auth.verify_access_token(&pair.access_token).await.unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.token_type, TokenType::Access);

        let refreshed = auth.refresh(&pair.refresh_token).await.unwrap();
        assert!(auth.verify_access_token(&refreshed.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn register_requires_known_user_and_policy() {
        let (auth, _, user) = setup().await;
        assert!(matches!(
            auth.register(UserId::new(), "password123").await,
            Err(AuthError::Domain(DomainError::NotFound(_)))
        ));
        assert!(matches!(
            auth.register(user.id, "short").await,
            Err(AuthError::Domain(DomainError::Validation(_)))
        ));
        auth.register(user.id, "password123").await.unwrap();
        assert!(matches!(
            auth.register(user.id, "password123").await,
            Err(AuthError::Domain(DomainError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (auth, _, user) = setup().await;
        auth.register(user.id, "password123").await.unwrap();
        assert!(matches!(
            auth.login("grace@example.com", "nope-nope").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn missing_accounts_still_pay_for_a_password_check() {
        let (auth, users, _) = setup().await;
        let unregistered = User::new("ada@example.com", "Ada", Utc::now());
        users.insert(&unregistered).await.unwrap();

        assert!(!auth.passwords.has_decoy());
        assert!(matches!(
            auth.login("ada@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(auth.passwords.has_decoy());
        assert!(matches!(
            auth.login("nobody@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn inactive_users_cannot_log_in_or_refresh() {
        let (auth, users, mut user) = setup().await;
        auth.register(user.id, "password123").await.unwrap();
        let pair = auth.login("grace@example.com", "password123").await.unwrap();

        user.active = false;
        users.update(&user).await.unwrap();

        assert!(matches!(
            auth.login("grace@example.com", "password123").await,
            Err(AuthError::InactiveUser(_))
        ));
        assert!(matches!(
            auth.refresh(&pair.refresh_token).await,
            Err(AuthError::InactiveUser(_))
        ));
    }

    #[tokio::test]
    async fn changing_the_password_revokes_outstanding_tokens() {
        let (auth, _, user) = setup().await;
        auth.register(user.id, "password123").await.unwrap();
        let old = auth.login("grace@example.com", "password123").await.unwrap();

        assert!(matches!(
            auth.change_password(user.id, "wrong-current", "newpassword1").await,
            Err(AuthError::InvalidCredentials)
        ));
        auth.change_password(user.id, "password123", "newpassword1").await.unwrap();

        assert!(matches!(
            auth.verify_access_token(&old.access_token).await,
            Err(AuthError::InvalidToken(_))
        ));
        assert!(auth.login("grace@example.com", "password123").await.is_err());
        assert!(auth.login("grace@example.com", "newpassword1").await.is_ok());
    }

    #[tokio::test]
    async fn access_tokens_cannot_refresh() {
        let (auth, _, user) = setup().await;
        auth.register(user.id, "password123").await.unwrap();
        let pair = auth.login("grace@example.com", "password123").await.unwrap();
        assert!(matches!(
            auth.refresh(&pair.access_token).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn unregister_removes_credentials_only() {
        let (auth, users, user) = setup().await;
        auth.register(user.id, "password123").await.unwrap();
        auth.unregister(user.id).await.unwrap();

        assert!(matches!(
            auth.login("grace@example.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(users.find_by_id(user.id).await.unwrap().is_some());
        assert!(matches!(
            auth.unregister(user.id).await,
            Err(AuthError::Domain(DomainError::NotFound(_)))
        ));
    }
}
