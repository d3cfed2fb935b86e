//! The identity subsystem handle.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use vexen_core::UserRepository;
use vexen_infra::{Backend, DataStore, DatabaseSettings, StoreError};

use crate::repository::{postgres, InMemoryUserRepository, PostgresUserRepository};
use crate::UserService;

/// Identity subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub database: DatabaseSettings,
}

impl IdentityConfig {
    pub fn new(database: DatabaseSettings) -> Self {
        Self { database }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity data store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Running identity subsystem.
///
/// Owns its data store; `close` drains it.
pub struct VexenUser {
    store: DataStore,
    repository: Arc<dyn UserRepository>,
    service: UserService,
}

impl core::fmt::Debug for VexenUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VexenUser")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl VexenUser {
    /// Open the data store, ensure the schema and build the capabilities.
    #[instrument(name = "identity_connect", skip_all)]
    pub async fn connect(config: IdentityConfig) -> Result<Self, IdentityError> {
        let store = DataStore::connect(&config.database).await?;
        if let Err(e) = store.ensure_schema(postgres::SCHEMA).await {
            warn!(error = %e, "identity schema setup failed; closing store");
            store.close().await;
            return Err(e.into());
        }

        let repository: Arc<dyn UserRepository> = match store.backend() {
            Backend::Memory => Arc::new(InMemoryUserRepository::with_echo(store.echo())),
            Backend::Postgres(pool) => Arc::new(PostgresUserRepository::new(pool.clone())),
        };

        info!("identity subsystem ready");
        Ok(Self::from_parts(store, repository))
    }

    /// Assemble from an already-open store and repository.
    pub fn from_parts(store: DataStore, repository: Arc<dyn UserRepository>) -> Self {
        let service = UserService::new(Arc::clone(&repository));
        Self {
            store,
            repository,
            service,
        }
    }

    /// Data-access capability, shareable with other subsystems.
    pub fn repository(&self) -> Arc<dyn UserRepository> {
        Arc::clone(&self.repository)
    }

    /// Business-operation capability.
    pub fn service(&self) -> &UserService {
        &self.service
    }

    pub async fn close(&self) {
        self.store.close().await;
        info!("identity subsystem closed");
    }
}
