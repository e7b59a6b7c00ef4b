//! Error types for the persistence layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors and adds the two domain-level failures a row store can
//! hit: a row that does not map back to a domain record, and a conditional
//! write that matched nothing.

use warfront_core::store::StoreError;

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row holds a value the domain types reject.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// A compare-and-set write matched no row.
    #[error("{0}")]
    Conflict(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(reason) => Self::Conflict(reason),
            other => Self::Backend(other.to_string()),
        }
    }
}
