//! Registry store abstraction.
//!
//! One query dialect, one conflict contract, two engines. Implemented by
//! [`crate::SqliteStore`], [`crate::PgStore`] and the dispatching
//! [`crate::StorageBackend`].

use async_trait::async_trait;
use serde::Serialize;

use crate::{Row, RunResult, SqlValue, Statement, StorageError};

/// Which engine sits behind the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Single-file SQLite database.
    Embedded,
    /// PostgreSQL reached over a connection string.
    Networked,
}

/// What `run_in_transaction` guarantees on this backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    /// All statements commit together or none do.
    Atomic,
    /// Statements run in order without a surrounding transaction. A failure
    /// midway leaves earlier statements applied; callers get retryable,
    /// at-least-once semantics instead of atomicity.
    BestEffort,
}

#[async_trait]
pub trait RegistryStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn transaction_mode(&self) -> TransactionMode;

    /// Execute an INSERT/UPDATE/DELETE.
    ///
    /// A unique-constraint violation is not an error: it yields
    /// `rows_affected == 0`.
    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunResult, StorageError>;

    async fn get_one(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>, StorageError>;

    async fn get_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError>;

    /// Execute a group of writes with the same conflict contract as [`Self::run`],
    /// returning one result per statement. See [`TransactionMode`] for the
    /// atomicity each backend provides.
    async fn run_in_transaction(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<RunResult>, StorageError>;

    /// Remove every record. The store stays usable afterwards.
    async fn wipe(&self) -> Result<(), StorageError>;

    /// Reopen the underlying handle.
    async fn reconnect(&self) -> Result<(), StorageError>;

    /// A consistent copy of the database file (embedded backend only).
    async fn raw_file(&self) -> Result<Vec<u8>, StorageError>;
}
