//! How the container obtains its subsystems.
//!
//! `VexenContainer` never names a concrete subsystem type. It asks a
//! `SubsystemFactory` for each one in dependency order and keeps the returned
//! handles as `Subsystem`s for shutdown.

use std::sync::Arc;

use async_trait::async_trait;

use vexen_auth::{AuthConfig, VexenAuth};
use vexen_core::UserRepository;
use vexen_identity::{IdentityConfig, VexenUser};
use vexen_rbac::{Rbac, RbacConfig};

/// A running subsystem the container can release.
#[async_trait]
pub trait Subsystem: Send + Sync {
    async fn shutdown(&self) -> anyhow::Result<()>;
}

/// The identity handle additionally exposes the user repository capability
/// that authentication is built on.
pub trait IdentityHandle: Subsystem {
    fn repository(&self) -> Arc<dyn UserRepository>;
}

/// One async constructor per subsystem.
#[async_trait]
pub trait SubsystemFactory: Send + Sync {
    type Identity: IdentityHandle + 'static;
    type Authorization: Subsystem + 'static;
    type Authentication: Subsystem + 'static;

    async fn identity(&self, config: IdentityConfig) -> anyhow::Result<Self::Identity>;

    async fn authorization(&self, config: RbacConfig) -> anyhow::Result<Self::Authorization>;

    async fn authentication(
        &self,
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
    ) -> anyhow::Result<Self::Authentication>;
}

/// Builds the workspace's own subsystems.
#[derive(Debug, Clone, Copy, Default)]
pub struct VexenSubsystems;

#[async_trait]
impl SubsystemFactory for VexenSubsystems {
    type Identity = VexenUser;
    type Authorization = Rbac;
    type Authentication = VexenAuth;

    async fn identity(&self, config: IdentityConfig) -> anyhow::Result<VexenUser> {
        Ok(VexenUser::connect(config).await?)
    }

    async fn authorization(&self, config: RbacConfig) -> anyhow::Result<Rbac> {
        Ok(Rbac::connect(config).await?)
    }

    async fn authentication(
        &self,
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
    ) -> anyhow::Result<VexenAuth> {
        Ok(VexenAuth::connect(config, users).await?)
    }
}

#[async_trait]
impl Subsystem for VexenUser {
    async fn shutdown(&self) -> anyhow::Result<()> {
        self.close().await;
        Ok(())
    }
}

impl IdentityHandle for VexenUser {
    fn repository(&self) -> Arc<dyn UserRepository> {
        VexenUser::repository(self)
    }
}

#[async_trait]
impl Subsystem for Rbac {
    async fn shutdown(&self) -> anyhow::Result<()> {
        self.close().await;
        Ok(())
    }
}

#[async_trait]
impl Subsystem for VexenAuth {
    async fn shutdown(&self) -> anyhow::Result<()> {
        self.close().await;
        Ok(())
    }
}
