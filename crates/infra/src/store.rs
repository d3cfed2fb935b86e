//! Data-store connection handling.
//!
//! Every subsystem opens its own `DataStore` from the same `DatabaseSettings`,
//! so each one owns its unit-of-work. There is no shared transaction across
//! subsystems.
//!
//! ## Supported URLs
//!
//! | URL | Backend |
//! |-----|---------|
//! | `memory`, `memory://<anything>` | in-process tables (tests/dev) |
//! | `postgres://…`, `postgresql://…` | SQLx `PgPool` |

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::ConnectOptions;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// How long a caller waits for a pooled connection before failing.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection parameters shared by every subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub url: String,
    /// Log every statement at `info` level.
    pub echo: bool,
    /// Connections kept open.
    pub pool_size: u32,
    /// Extra connections allowed above `pool_size` under load.
    pub max_overflow: u32,
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            echo: false,
            pool_size: 5,
            max_overflow: 10,
        }
    }

    /// Upper bound on simultaneously open connections.
    pub fn max_connections(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow)
    }

    /// The URL scheme (`memory`, `postgres`, ...), lowercased.
    pub fn scheme(&self) -> Option<String> {
        let url = self.url.trim();
        if url.is_empty() {
            return None;
        }
        let scheme = url.split_once("://").map_or(url, |(scheme, _)| scheme);
        Some(scheme.to_ascii_lowercase())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database url is empty")]
    EmptyUrl,

    #[error("unsupported database url scheme '{0}' (expected memory, postgres or postgresql)")]
    UnsupportedScheme(String),

    #[error("invalid pool sizing: pool_size must be positive")]
    InvalidPoolSize,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage backend selected from the URL scheme.
#[derive(Debug, Clone)]
pub enum Backend {
    Memory,
    Postgres(PgPool),
}

/// An open data store.
///
/// Cloning is cheap: the Postgres pool is reference counted.
#[derive(Debug, Clone)]
pub struct DataStore {
    backend: Backend,
    echo: bool,
}

impl DataStore {
    /// Open a data store for `settings`.
    ///
    /// Postgres pools connect lazily; the first statement (normally schema
    /// creation during subsystem startup) surfaces connectivity failures.
    #[instrument(name = "datastore_connect", skip(settings), fields(scheme = tracing::field::Empty))]
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let scheme = settings.scheme().ok_or(StoreError::EmptyUrl)?;
        tracing::Span::current().record("scheme", scheme.as_str());

        if settings.pool_size == 0 {
            return Err(StoreError::InvalidPoolSize);
        }

        let backend = match scheme.as_str() {
            "memory" => Backend::Memory,
            "postgres" | "postgresql" => {
                let mut options = PgConnectOptions::from_str(settings.url.trim())?;
                if !settings.echo {
                    options = options.disable_statement_logging();
                }
                let pool = PgPoolOptions::new()
                    .min_connections(settings.pool_size)
                    .max_connections(settings.max_connections())
                    .acquire_timeout(ACQUIRE_TIMEOUT)
                    .connect_lazy_with(options);
                Backend::Postgres(pool)
            }
            other => return Err(StoreError::UnsupportedScheme(other.to_string())),
        };

        info!(
            scheme = %scheme,
            pool_size = settings.pool_size,
            max_connections = settings.max_connections(),
            "data store opened"
        );

        Ok(Self {
            backend,
            echo: settings.echo,
        })
    }

    /// An in-process store (tests/dev).
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            echo: false,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Run idempotent DDL statements in order. No-op for the memory backend.
    pub async fn ensure_schema(&self, statements: &[&str]) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Memory => Ok(()),
            Backend::Postgres(pool) => {
                for statement in statements {
                    sqlx::query(statement).execute(pool).await?;
                }
                debug!(statements = statements.len(), "schema ensured");
                Ok(())
            }
        }
    }

    /// Drain and close the underlying pool.
    ///
    /// Safe to call more than once.
    pub async fn close(&self) {
        match &self.backend {
            Backend::Memory => {}
            Backend::Postgres(pool) => {
                if !pool.is_closed() {
                    pool.close().await;
                }
            }
        }
        debug!("data store closed");
    }
}
