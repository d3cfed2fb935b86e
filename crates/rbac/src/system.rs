//! The authorization subsystem handle.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use vexen_infra::{Backend, DataStore, DatabaseSettings, StoreError};

use crate::store::{postgres, InMemoryRoleStore, PostgresRoleStore, RoleStore};
use crate::RoleService;

/// Authorization subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacConfig {
    pub database: DatabaseSettings,
}

impl RbacConfig {
    pub fn new(database: DatabaseSettings) -> Self {
        Self { database }
    }
}

#[derive(Debug, Error)]
pub enum RbacStartupError {
    #[error("authorization data store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Running authorization subsystem.
pub struct Rbac {
    store: DataStore,
    roles: RoleService,
}

impl core::fmt::Debug for Rbac {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rbac").field("store", &self.store).finish_non_exhaustive()
    }
}

impl Rbac {
    #[instrument(name = "rbac_connect", skip_all)]
    pub async fn connect(config: RbacConfig) -> Result<Self, RbacStartupError> {
        let store = DataStore::connect(&config.database).await?;
        if let Err(e) = store.ensure_schema(postgres::SCHEMA).await {
            warn!(error = %e, "rbac schema setup failed; closing store");
            store.close().await;
            return Err(e.into());
        }

        let roles: Arc<dyn RoleStore> = match store.backend() {
            Backend::Memory => Arc::new(InMemoryRoleStore::with_echo(store.echo())),
            Backend::Postgres(pool) => Arc::new(PostgresRoleStore::new(pool.clone())),
        };

        info!("authorization subsystem ready");
        Ok(Self {
            store,
            roles: RoleService::new(roles),
        })
    }

    pub fn roles(&self) -> &RoleService {
        &self.roles
    }

    pub async fn close(&self) {
        self.store.close().await;
        info!("authorization subsystem closed");
    }
}
