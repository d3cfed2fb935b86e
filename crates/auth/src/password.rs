//! Password hashing using Argon2.

use std::sync::{Arc, OnceLock};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use vexen_core::DomainError;

/// Shortest password accepted at registration or change.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Password hashing service using Argon2id with default parameters.
#[derive(Clone, Default)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    decoy: Arc<OnceLock<String>>,
}

impl core::fmt::Debug for PasswordService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordService").finish_non_exhaustive()
    }
}

impl PasswordService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject passwords shorter than `MIN_PASSWORD_LENGTH` characters.
    pub fn check_policy(&self, password: &str) -> Result<(), DomainError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok(())
    }

    /// Hash a password into a PHC string.
    pub fn hash_password(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self.argon2.hash_password(password.as_bytes(), &salt)?.to_string())
    }

    /// Verify a password against a stored PHC string.
    ///
    /// A malformed hash is an error; a mismatch is `Ok(false)`.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed = PasswordHash::new(hash)?;
        Ok(self.argon2.verify_password(password.as_bytes(), &parsed).is_ok())
    }

    /// Verify `password` against a throwaway hash so a missing account costs
    /// as much as a wrong password. Always `Ok(false)`.
    pub fn verify_decoy(&self, password: &str) -> Result<bool, argon2::password_hash::Error> {
        let hash = match self.decoy.get() {
            Some(hash) => hash,
            None => {
                let fresh = self.hash_password("vexen-decoy-credential")?;
                self.decoy.get_or_init(|| fresh)
            }
        };
        self.verify_password(password, hash)?;
        Ok(false)
    }

    #[cfg(test)]
    pub(crate) fn has_decoy(&self) -> bool {
        self.decoy.get().is_some()
    }
}
