//! `vexen-identity`: user identity subsystem.
//!
//! Exposes two capabilities: a `UserRepository` (data access, shareable with
//! other subsystems) and a `UserService` (business operations).

pub mod dto;
pub mod repository;
pub mod service;
pub mod system;

pub use dto::{CreateUserRequest, UpdateUserRequest};
pub use repository::{InMemoryUserRepository, PostgresUserRepository};
pub use service::{UserService, UserServiceError};
pub use system::{IdentityConfig, IdentityError, VexenUser};

pub use vexen_core::{Page, User, UserId, UserRepository};
