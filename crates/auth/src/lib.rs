//! `vexen-auth`: credentials and token-based authentication.
//!
//! Users are owned by the identity subsystem and reached only through the
//! injected `UserRepository`. This crate stores password hashes and issues
//! signed access/refresh tokens.

pub mod claims;
pub mod password;
pub mod service;
pub mod store;
pub mod system;
pub mod tokens;

pub use claims::{validate_claims, TokenClaims, TokenType, TokenValidationError};
pub use password::{PasswordService, MIN_PASSWORD_LENGTH};
pub use service::{AuthError, AuthService};
pub use store::{CredentialStore, Credentials, InMemoryCredentialStore, PostgresCredentialStore};
pub use system::{AuthConfig, AuthStartupError, VexenAuth};
pub use tokens::{parse_algorithm, TokenError, TokenIssuer, TokenPair, SUPPORTED_ALGORITHMS};
