//! `vexen`: a lifecycle container for the Vexen identity, authorization and
//! authentication subsystems.
//!
//! ```no_run
//! use vexen::{VexenConfig, VexenContainer};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut container = VexenContainer::new(VexenConfig::new("memory://", "dev-secret"));
//! container.init().await?;
//! let users = container.identity()?.service().list(Default::default()).await?;
//! container.close().await?;
//! # let _ = users;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod factory;

pub use config::{ConfigError, VexenConfig};
pub use container::VexenContainer;
pub use error::{
    AccessError, ContainerError, ContainerState, InitError, LifecycleError, ReleaseFailure,
    ScopeError, SubsystemKind, TeardownError,
};
pub use factory::{IdentityHandle, Subsystem, SubsystemFactory, VexenSubsystems};

pub use vexen_auth as auth;
pub use vexen_identity as identity;
pub use vexen_rbac as rbac;
