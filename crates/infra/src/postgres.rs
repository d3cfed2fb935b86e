//! SQLx helpers shared by the Postgres repositories.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | RowNotFound | N/A | `NotFound` |
//! | anything else | any | `Storage` |

use vexen_core::RepositoryError;

const UNIQUE_VIOLATION: &str = "23505";

/// Map a SQLx error onto the repository error model.
pub fn repository_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            RepositoryError::Conflict(db.message().to_string())
        }
        _ => RepositoryError::storage(err),
    }
}

/// Clamp a page bound into the `BIGINT` range Postgres expects for
/// `LIMIT`/`OFFSET`.
pub fn page_bound(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            repository_error(sqlx::Error::RowNotFound),
            RepositoryError::NotFound(_)
        ));
    }

    #[test]
    fn pool_closed_maps_to_storage() {
        assert!(matches!(
            repository_error(sqlx::Error::PoolClosed),
            RepositoryError::Storage(_)
        ));
    }

    #[test]
    fn page_bound_saturates() {
        assert_eq!(page_bound(10), 10);
        assert_eq!(page_bound(usize::MAX), i64::MAX);
    }
}
