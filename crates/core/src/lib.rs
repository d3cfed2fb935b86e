//! `vexen-core`: shared primitives for the Vexen subsystems.
//!
//! This crate holds the types more than one subsystem needs to agree on:
//! identifiers, the domain error model, the `User` record and the
//! `UserRepository` capability. Nothing here touches storage or transport.

pub mod error;
pub mod id;
pub mod repository;
pub mod user;

pub use error::{DomainError, DomainResult};
pub use id::{TokenId, UserId};
pub use repository::{Page, RepositoryError, RepositoryResult, UserRepository};
pub use user::User;
