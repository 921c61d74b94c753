//! Unified storage backend with enum dispatch.
//!
//! Resolved once at startup from [`StorageConfig`]; the rest of the system only
//! sees the [`RegistryStore`] interface.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::traits::{BackendKind, RegistryStore, TransactionMode};
use crate::{Row, RunResult, SqlValue, Statement, StorageError};

macro_rules! dispatch {
    (async $self:expr, $method:ident ( $($arg:expr),* $(,)? )) => {
        match $self {
            #[cfg(feature = "sqlite")]
            StorageBackend::Sqlite(s) => <crate::SqliteStore as RegistryStore>::$method(s, $($arg),*).await,
            #[cfg(feature = "postgres")]
            StorageBackend::Postgres(s) => <crate::PgStore as RegistryStore>::$method(s, $($arg),*).await,
        }
    };
    ($self:expr, $method:ident ( $($arg:expr),* $(,)? )) => {
        match $self {
            #[cfg(feature = "sqlite")]
            StorageBackend::Sqlite(s) => <crate::SqliteStore as RegistryStore>::$method(s, $($arg),*),
            #[cfg(feature = "postgres")]
            StorageBackend::Postgres(s) => <crate::PgStore as RegistryStore>::$method(s, $($arg),*),
        }
    };
}

/// Where the registry lives.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// PostgreSQL connection string. When present the networked backend is used.
    pub database_url: Option<String>,
    /// SQLite database file for the embedded backend.
    pub sqlite_path: PathBuf,
    /// SQLite connection pool size.
    pub sqlite_pool_size: u32,
}

#[derive(Clone, Debug)]
pub enum StorageBackend {
    #[cfg(feature = "sqlite")]
    Sqlite(crate::SqliteStore),
    #[cfg(feature = "postgres")]
    Postgres(crate::PgStore),
}

impl StorageBackend {
    /// Open the backend the configuration selects.
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        match config.database_url.as_deref() {
            Some(url) => Self::new_postgres(url).await,
            None => Self::new_sqlite(config),
        }
    }

    #[cfg(feature = "sqlite")]
    pub fn new_sqlite(config: &StorageConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.sqlite_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self::Sqlite(crate::SqliteStore::open(&config.sqlite_path, config.sqlite_pool_size)?))
    }

    #[cfg(not(feature = "sqlite"))]
    pub fn new_sqlite(_config: &StorageConfig) -> Result<Self, StorageError> {
        Err(StorageError::Unsupported("built without the sqlite feature"))
    }

    #[cfg(feature = "postgres")]
    pub async fn new_postgres(database_url: &str) -> Result<Self, StorageError> {
        Ok(Self::Postgres(crate::PgStore::connect(database_url).await?))
    }

    #[cfg(not(feature = "postgres"))]
    pub async fn new_postgres(_database_url: &str) -> Result<Self, StorageError> {
        Err(StorageError::Unsupported("built without the postgres feature"))
    }
}

#[async_trait]
impl RegistryStore for StorageBackend {
    fn kind(&self) -> BackendKind {
        dispatch!(self, kind())
    }

    fn transaction_mode(&self) -> TransactionMode {
        dispatch!(self, transaction_mode())
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunResult, StorageError> {
        dispatch!(async self, run(sql, params))
    }

    async fn get_one(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>, StorageError> {
        dispatch!(async self, get_one(sql, params))
    }

    async fn get_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
        dispatch!(async self, get_all(sql, params))
    }

    async fn run_in_transaction(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<RunResult>, StorageError> {
        dispatch!(async self, run_in_transaction(statements))
    }

    async fn wipe(&self) -> Result<(), StorageError> {
        dispatch!(async self, wipe())
    }

    async fn reconnect(&self) -> Result<(), StorageError> {
        dispatch!(async self, reconnect())
    }

    async fn raw_file(&self) -> Result<Vec<u8>, StorageError> {
        dispatch!(async self, raw_file())
    }
}
