//! Container configuration.
//!
//! Built by the caller, validated by `VexenContainer::init`, then shared
//! read-only. Each subsystem receives only its own projection.

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use vexen_auth::{parse_algorithm, AuthConfig};
use vexen_identity::IdentityConfig;
use vexen_infra::DatabaseSettings;
use vexen_rbac::RbacConfig;

pub const DEFAULT_POOL_SIZE: u32 = 5;
pub const DEFAULT_MAX_OVERFLOW: u32 = 10;
pub const DEFAULT_ALGORITHM: &str = "HS256";
pub const DEFAULT_ACCESS_TOKEN_EXPIRES_MINUTES: u32 = 15;
pub const DEFAULT_REFRESH_TOKEN_EXPIRES_DAYS: u32 = 30;

const SUPPORTED_SCHEMES: &[&str] = &["memory", "postgres", "postgresql"];

/// Environment variables read by `VexenConfig::from_env`.
pub mod env {
    pub const DATABASE_URL: &str = "VEXEN_DATABASE_URL";
    pub const SECRET_KEY: &str = "VEXEN_SECRET_KEY";
    pub const ALGORITHM: &str = "VEXEN_ALGORITHM";
    pub const ECHO: &str = "VEXEN_ECHO";
    pub const POOL_SIZE: &str = "VEXEN_POOL_SIZE";
    pub const MAX_OVERFLOW: &str = "VEXEN_MAX_OVERFLOW";
    pub const ACCESS_TOKEN_EXPIRES_MINUTES: &str = "VEXEN_ACCESS_TOKEN_EXPIRES_MINUTES";
    pub const REFRESH_TOKEN_EXPIRES_DAYS: &str = "VEXEN_REFRESH_TOKEN_EXPIRES_DAYS";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unsupported signing algorithm '{0}' (expected HS256, HS384 or HS512)")]
    UnsupportedAlgorithm(String),

    #[error("environment variable {var} has an unparsable value '{value}'")]
    Env { var: &'static str, value: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Settings shared by the three subsystems.
///
/// `Debug` output redacts the secret key.
#[derive(Debug)]
pub struct VexenConfig {
    database_url: String,
    echo: bool,
    pool_size: u32,
    max_overflow: u32,
    secret_key: SecretString,
    algorithm: String,
    access_token_expires_minutes: u32,
    refresh_token_expires_days: u32,
}

impl VexenConfig {
    pub fn new(database_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            echo: false,
            pool_size: DEFAULT_POOL_SIZE,
            max_overflow: DEFAULT_MAX_OVERFLOW,
            secret_key: SecretString::new(secret_key.into()),
            algorithm: DEFAULT_ALGORITHM.to_string(),
            access_token_expires_minutes: DEFAULT_ACCESS_TOKEN_EXPIRES_MINUTES,
            refresh_token_expires_days: DEFAULT_REFRESH_TOKEN_EXPIRES_DAYS,
        }
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_max_overflow(mut self, max_overflow: u32) -> Self {
        self.max_overflow = max_overflow;
        self
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn with_access_token_minutes(mut self, minutes: u32) -> Self {
        self.access_token_expires_minutes = minutes;
        self
    }

    pub fn with_refresh_token_days(mut self, days: u32) -> Self {
        self.refresh_token_expires_days = days;
        self
    }

    /// Load from `VEXEN_*` process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup using the `VEXEN_*` names.
    ///
    /// Unset optional keys keep their defaults. The result is not validated.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get(env::DATABASE_URL).ok_or(ConfigError::Missing(env::DATABASE_URL))?;
        let secret_key = get(env::SECRET_KEY).ok_or(ConfigError::Missing(env::SECRET_KEY))?;
        let mut config = Self::new(database_url, secret_key);

        if let Some(algorithm) = get(env::ALGORITHM) {
            config.algorithm = algorithm;
        }
        if let Some(echo) = get(env::ECHO) {
            config.echo = parse_bool(env::ECHO, &echo)?;
        }
        if let Some(v) = get(env::POOL_SIZE) {
            config.pool_size = parse_u32(env::POOL_SIZE, &v)?;
        }
        if let Some(v) = get(env::MAX_OVERFLOW) {
            config.max_overflow = parse_u32(env::MAX_OVERFLOW, &v)?;
        }
        if let Some(v) = get(env::ACCESS_TOKEN_EXPIRES_MINUTES) {
            config.access_token_expires_minutes = parse_u32(env::ACCESS_TOKEN_EXPIRES_MINUTES, &v)?;
        }
        if let Some(v) = get(env::REFRESH_TOKEN_EXPIRES_DAYS) {
            config.refresh_token_expires_days = parse_u32(env::REFRESH_TOKEN_EXPIRES_DAYS, &v)?;
        }
        Ok(config)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    pub fn max_overflow(&self) -> u32 {
        self.max_overflow
    }

    pub fn secret_key(&self) -> &SecretString {
        &self.secret_key
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn access_token_expires_minutes(&self) -> u32 {
        self.access_token_expires_minutes
    }

    pub fn refresh_token_expires_days(&self) -> u32 {
        self.refresh_token_expires_days
    }

    /// Check every field; the first violation is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme = self
            .database_settings()
            .scheme()
            .ok_or(ConfigError::Missing("database_url"))?;
        if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
            return Err(ConfigError::invalid(
                "database_url",
                format!("unsupported scheme '{scheme}' (expected one of {SUPPORTED_SCHEMES:?})"),
            ));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::invalid("pool_size", "must be greater than zero"));
        }
        if self.secret_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Missing("secret_key"));
        }
        parse_algorithm(&self.algorithm)
            .map_err(|_| ConfigError::UnsupportedAlgorithm(self.algorithm.clone()))?;
        if self.access_token_expires_minutes == 0 {
            return Err(ConfigError::invalid(
                "access_token_expires_minutes",
                "must be greater than zero",
            ));
        }
        if self.refresh_token_expires_days == 0 {
            return Err(ConfigError::invalid(
                "refresh_token_expires_days",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    fn database_settings(&self) -> DatabaseSettings {
        DatabaseSettings {
            url: self.database_url.clone(),
            echo: self.echo,
            pool_size: self.pool_size,
            max_overflow: self.max_overflow,
        }
    }

    pub fn identity_config(&self) -> IdentityConfig {
        IdentityConfig::new(self.database_settings())
    }

    pub fn rbac_config(&self) -> RbacConfig {
        RbacConfig::new(self.database_settings())
    }

    /// Fails only if the algorithm is unsupported.
    pub fn auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let algorithm = parse_algorithm(&self.algorithm)
            .map_err(|_| ConfigError::UnsupportedAlgorithm(self.algorithm.clone()))?;
        let secret_key = SecretString::new(self.secret_key.expose_secret().clone());
        Ok(AuthConfig {
            algorithm,
            access_token_ttl: Duration::minutes(i64::from(self.access_token_expires_minutes)),
            refresh_token_ttl: Duration::days(i64::from(self.refresh_token_expires_days)),
            ..AuthConfig::new(self.database_settings(), secret_key)
        })
    }
}

fn parse_u32(var: &'static str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            var,
            value: value.to_string(),
        }),
    }
}
