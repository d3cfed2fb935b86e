use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use vexen_core::DomainError;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "users.read").
/// The wildcard permission `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: &'static str = "*";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Parse user input: trimmed, non-empty, no inner whitespace.
    pub fn parse(name: &str) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!("invalid permission '{name}'")));
        }
        Ok(Self(Cow::Owned(name.to_string())))
    }

    pub fn wildcard() -> Self {
        Self(Cow::Borrowed(Self::WILDCARD))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == Self::WILDCARD
    }

    /// Whether holding `self` satisfies a requirement for `required`.
    pub fn grants(&self, required: &Permission) -> bool {
        self.is_wildcard() || self == required
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_rejects_whitespace() {
        assert_eq!(Permission::parse(" users.read ").unwrap().as_str(), "users.read");
        assert!(Permission::parse("users read").is_err());
        assert!(Permission::parse("   ").is_err());
    }

    #[test]
    fn wildcard_grants_anything_but_plain_permissions_grant_only_themselves() {
        let read = Permission::new("users.read");
        let write = Permission::new("users.write");
        assert!(Permission::wildcard().grants(&read));
        assert!(read.grants(&read));
        assert!(!read.grants(&write));
    }
}
