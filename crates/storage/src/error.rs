//! Typed error enum for the storage layer.
//!
//! Unique-constraint violations never surface here: both backends report them
//! as a zero-row `RunResult`, so callers classify duplicates without looking at
//! engine error codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Row not found for expected-present entity.
    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// SQLite statement or connection failure.
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// SQLite connection pool could not hand out a connection.
    #[cfg(feature = "sqlite")]
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// PostgreSQL query / connection / timeout failure.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[source] sqlx::Error),

    /// Row data could not be mapped into a domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// The store handle is closed (a wipe failed to reopen it).
    #[error("store is closed; reconnect required")]
    Closed,

    /// The active backend cannot perform this operation.
    #[error("unsupported by this backend: {0}")]
    Unsupported(&'static str),

    /// Filesystem failure around the embedded database file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Task(String),
}

impl StorageError {
    /// Whether this error is likely transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            #[cfg(feature = "sqlite")]
            Self::Pool(_) => true,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(e.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            },
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Custom `From<sqlx::Error>`, not a blanket `#[from]`: `RowNotFound` becomes
/// `NotFound` so callers can match on it like the SQLite path.
#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound { entity: "row", id: "unknown".into() },
            other => Self::Postgres(other),
        }
    }
}
