//! The authentication subsystem handle.

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, instrument, warn};

use vexen_core::UserRepository;
use vexen_infra::{Backend, DataStore, DatabaseSettings, StoreError};

use crate::store::{postgres, CredentialStore, InMemoryCredentialStore, PostgresCredentialStore};
use crate::tokens::TokenIssuer;
use crate::AuthService;

/// Authentication subsystem configuration.
///
/// Not `Clone`: the secret is held once and only exposed to build signing
/// keys.
#[derive(Debug)]
pub struct AuthConfig {
    pub database: DatabaseSettings,
    pub secret_key: SecretString,
    pub algorithm: Algorithm,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl AuthConfig {
    /// HS256 with 15 minute access and 30 day refresh tokens.
    pub fn new(database: DatabaseSettings, secret_key: SecretString) -> Self {
        Self {
            database,
            secret_key,
            algorithm: Algorithm::HS256,
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthStartupError {
    #[error("authentication data store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Running authentication subsystem.
pub struct VexenAuth {
    store: DataStore,
    service: AuthService,
}

impl core::fmt::Debug for VexenAuth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VexenAuth")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl VexenAuth {
    /// Open the credential store and wire the service to `users`.
    #[instrument(name = "auth_connect", skip_all, fields(algorithm = ?config.algorithm))]
    pub async fn connect(
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
    ) -> Result<Self, AuthStartupError> {
        let store = DataStore::connect(&config.database).await?;
        if let Err(e) = store.ensure_schema(postgres::SCHEMA).await {
            warn!(error = %e, "auth schema setup failed; closing store");
            store.close().await;
            return Err(e.into());
        }

        let credentials: Arc<dyn CredentialStore> = match store.backend() {
            Backend::Memory => Arc::new(InMemoryCredentialStore::with_echo(store.echo())),
            Backend::Postgres(pool) => Arc::new(PostgresCredentialStore::new(pool.clone())),
        };
        let tokens = TokenIssuer::new(
            &config.secret_key,
            config.algorithm,
            config.access_token_ttl,
            config.refresh_token_ttl,
        );

        info!("authentication subsystem ready");
        Ok(Self {
            store,
            service: AuthService::new(users, credentials, tokens),
        })
    }

    pub fn service(&self) -> &AuthService {
        &self.service
    }

    pub async fn close(&self) {
        self.store.close().await;
        info!("authentication subsystem closed");
    }
}
