//! Storage layer for notescan
//!
//! The serial registry behind one [`RegistryStore`] interface with two engines:
//! an embedded single-file SQLite database and a networked PostgreSQL server.
//! [`SerialRegistry`] is the typed facade the services use.

mod backend;
mod dialect;
mod error;
mod registry;
mod traits;
mod value;

#[cfg(feature = "sqlite")]
mod migrations;
#[cfg(feature = "sqlite")]
mod sqlite_store;

#[cfg(feature = "postgres")]
mod pg_migrations;
#[cfg(feature = "postgres")]
mod pg_store;


pub use backend::{StorageBackend, StorageConfig};
pub use dialect::Dialect;
pub use error::StorageError;
pub use registry::{
    ImportRow, InsertTally, Pagination, RecordPage, RegistryStats, SerialRegistry, UpsertTally,
};
pub use traits::{BackendKind, RegistryStore, TransactionMode};
pub use value::{Row, RunResult, SqlValue, Statement};

#[cfg(feature = "postgres")]
pub use pg_store::PgStore;
#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteStore;
