//! `vexen-rbac`: role/permission (authorization) subsystem.
//!
//! Roles are named bundles of permissions; users are assigned roles. The
//! subsystem knows users only by `UserId` and has no dependency on identity.

pub mod authorize;
pub mod permissions;
pub mod roles;
pub mod service;
pub mod store;
pub mod system;

pub use authorize::{authorize, explain, AuthorizationExplanation, AuthzError};
pub use permissions::Permission;
pub use roles::{CreateRoleRequest, Role, RoleDefinition};
pub use service::{RbacError, RoleService};
pub use store::{InMemoryRoleStore, PostgresRoleStore, RoleStore};
pub use system::{Rbac, RbacConfig, RbacStartupError};
