//! Pure authorization checks over resolved role definitions.
//!
//! - No IO
//! - No panics

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use vexen_core::UserId;

use crate::{Permission, RoleDefinition};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: user {user_id} is missing permission '{permission}'")]
    Forbidden { user_id: UserId, permission: String },
}

/// Authorize `user_id` holding `roles` for `required`.
pub fn authorize(
    user_id: UserId,
    roles: &[RoleDefinition],
    required: &Permission,
) -> Result<(), AuthzError> {
    if roles.iter().any(|r| r.grants(required)) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            user_id,
            permission: required.as_str().to_string(),
        })
    }
}

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationExplanation {
    pub user_id: UserId,
    pub required_permission: String,
    pub granted: bool,
    /// Human-readable reason for the decision.
    pub reason: String,
    pub roles: Vec<String>,
    /// Roles among `roles` that grant the permission.
    pub granting_roles: Vec<String>,
    pub effective_permissions: Vec<String>,
}

/// Explain why an authorization decision was made (or would be made).
pub fn explain(
    user_id: UserId,
    roles: &[RoleDefinition],
    required: &Permission,
) -> AuthorizationExplanation {
    let granting_roles: Vec<String> = roles
        .iter()
        .filter(|r| r.grants(required))
        .map(|r| r.name.as_str().to_string())
        .collect();

    let effective: BTreeSet<&str> = roles
        .iter()
        .flat_map(|r| r.permissions.iter().map(Permission::as_str))
        .collect();

    let granted = !granting_roles.is_empty();
    let reason = if !granted {
        if roles.is_empty() {
            "user has no roles".to_string()
        } else {
            format!(
                "no assigned role grants '{}'; effective permissions: {:?}",
                required, effective
            )
        }
    } else if effective.contains(Permission::WILDCARD) {
        format!("wildcard permission '*' granted by {:?}", granting_roles)
    } else {
        format!("permission '{}' granted by {:?}", required, granting_roles)
    };

    AuthorizationExplanation {
        user_id,
        required_permission: required.as_str().to_string(),
        granted,
        reason,
        roles: roles.iter().map(|r| r.name.as_str().to_string()).collect(),
        granting_roles,
        effective_permissions: effective.into_iter().map(str::to_string).collect(),
    }
}
