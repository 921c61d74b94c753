//! Embedded registry store on SQLite.
//!
//! rusqlite calls are blocking and run on the tokio blocking pool. The r2d2
//! pool sits behind a lock so `wipe` and `reconnect` can close it, touch the
//! file, and reopen while no statement is in flight.

// SQLite change counts are usize, the contract is u64
#![allow(
    clippy::as_conversions,
    reason = "usize -> u64 widening of SQLite change counts is lossless"
)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use notescan_core::format_timestamp;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, ToSql, TransactionBehavior};

use crate::dialect::Dialect;
use crate::migrations::run_migrations;
use crate::traits::{BackendKind, RegistryStore, TransactionMode};
use crate::{Row, RunResult, SqlValue, Statement, StorageError};

type SqlitePool = Pool<SqliteConnectionManager>;

/// Handle to the single-file registry.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    path: Arc<PathBuf>,
    pool_size: u32,
    pool: Arc<RwLock<Option<SqlitePool>>>,
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Self::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Timestamp(ts) => ToSqlOutput::Owned(Value::Text(format_timestamp(ts))),
        })
    }
}

fn init_connection(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA busy_timeout = 30000;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )
}

fn open_pool(path: &Path, pool_size: u32) -> Result<SqlitePool, StorageError> {
    let manager = SqliteConnectionManager::file(path).with_init(init_connection);
    let pool = Pool::builder().max_size(pool_size).build(manager)?;

    let conn = pool.get()?;
    run_migrations(&conn).map_err(|e| StorageError::Migration(e.to_string()))?;
    drop(conn);

    Ok(pool)
}

fn remove_database_files(path: &Path) -> Result<(), StorageError> {
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(suffix);
        match std::fs::remove_file(&candidate) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        },
        _ => false,
    }
}

fn execute_mapped(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
) -> Result<RunResult, StorageError> {
    match conn.execute(sql, params_from_iter(params.iter())) {
        Ok(changed) => Ok(RunResult::new(changed as u64)),
        Err(e) if is_unique_violation(&e) => {
            tracing::debug!(error = %e, "unique constraint hit, reporting zero rows");
            Ok(RunResult::default())
        },
        Err(e) => Err(e.into()),
    }
}

fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> Result<Row, StorageError> {
    let values = (0..columns.len())
        .map(|idx| {
            Ok(match row.get_ref(idx)? {
                ValueRef::Null => SqlValue::Null,
                ValueRef::Integer(i) => SqlValue::Integer(i),
                ValueRef::Real(f) => SqlValue::Real(f),
                ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                    SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
                },
            })
        })
        .collect::<Result<Vec<_>, StorageError>>()?;
    Ok(Row::new(columns.to_vec(), values))
}

fn query_rows(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
    limit: Option<usize>,
) -> Result<Vec<Row>, StorageError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(ToOwned::to_owned).collect();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_row(row, &columns)?);
        if limit.is_some_and(|max| out.len() >= max) {
            break;
        }
    }
    Ok(out)
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, StorageError> {
        let pool = open_pool(path, pool_size)?;
        tracing::info!(path = %path.display(), pool_size, "SQLite store initialized");
        Ok(Self {
            path: Arc::new(path.to_path_buf()),
            pool_size,
            pool: Arc::new(RwLock::new(Some(pool))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on a pooled connection while holding the pool read lock, so
    /// `wipe` cannot close the pool underneath it.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let guard =
            self.pool.read().map_err(|_| StorageError::Task("sqlite pool lock poisoned".into()))?;
        let pool = guard.as_ref().ok_or(StorageError::Closed)?;
        let mut conn = pool.get()?;
        f(&mut conn)
    }

    pub fn run_blocking(&self, sql: &str, params: &[SqlValue]) -> Result<RunResult, StorageError> {
        self.with_conn(|conn| execute_mapped(conn, sql, params))
    }

    pub fn query_blocking(
        &self,
        sql: &str,
        params: &[SqlValue],
        limit: Option<usize>,
    ) -> Result<Vec<Row>, StorageError> {
        self.with_conn(|conn| query_rows(conn, sql, params, limit))
    }

    /// Conflicting statements report zero rows without aborting the group;
    /// any other failure rolls everything back.
    pub fn transaction_blocking(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<RunResult>, StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut results = Vec::with_capacity(statements.len());
            for stmt in statements {
                results.push(execute_mapped(&tx, &stmt.sql, &stmt.params)?);
            }
            tx.commit()?;
            Ok(results)
        })
    }

    /// Close the pool, delete the database file and reopen an empty one.
    ///
    /// On failure the previous file (if it still exists) is reopened before the
    /// error is returned. If even that fails the store stays closed and every
    /// call returns [`StorageError::Closed`] until [`Self::reconnect_blocking`]
    /// succeeds.
    pub fn wipe_blocking(&self) -> Result<(), StorageError> {
        let mut guard =
            self.pool.write().map_err(|_| StorageError::Task("sqlite pool lock poisoned".into()))?;
        // The write lock means no connection is checked out; dropping the pool
        // closes every idle one.
        drop(guard.take());

        match remove_database_files(&self.path).and_then(|()| open_pool(&self.path, self.pool_size))
        {
            Ok(pool) => {
                *guard = Some(pool);
                tracing::info!(path = %self.path.display(), "SQLite registry recreated empty");
                Ok(())
            },
            Err(err) => {
                tracing::error!(error = %err, "wipe failed, reopening database");
                match open_pool(&self.path, self.pool_size) {
                    Ok(pool) => *guard = Some(pool),
                    Err(reopen_err) => {
                        tracing::error!(error = %reopen_err, "reopen after failed wipe failed, store closed");
                    },
                }
                Err(err)
            },
        }
    }

    pub fn reconnect_blocking(&self) -> Result<(), StorageError> {
        let mut guard =
            self.pool.write().map_err(|_| StorageError::Task("sqlite pool lock poisoned".into()))?;
        drop(guard.take());
        *guard = Some(open_pool(&self.path, self.pool_size)?);
        tracing::info!(path = %self.path.display(), "SQLite store reconnected");
        Ok(())
    }

    /// Consistent single-file copy via `VACUUM INTO`.
    pub fn snapshot_blocking(&self) -> Result<Vec<u8>, StorageError> {
        let dir = tempfile::TempDir::new()?;
        let target = dir.path().join("registry-snapshot.db");
        let target_str = target.to_string_lossy().into_owned();
        self.with_conn(|conn| {
            conn.execute("VACUUM INTO ?1", [&target_str])?;
            Ok(())
        })?;
        Ok(std::fs::read(&target)?)
    }
}

/// Helper: run a blocking closure on the tokio blocking pool.
async fn blocking<F, T>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| StorageError::Task(e.to_string()))?
}

#[async_trait]
impl RegistryStore for SqliteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn transaction_mode(&self) -> TransactionMode {
        TransactionMode::Atomic
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunResult, StorageError> {
        let store = self.clone();
        let sql = Dialect::Sqlite.rewrite(sql).into_owned();
        let params = params.to_vec();
        blocking(move || store.run_blocking(&sql, &params)).await
    }

    async fn get_one(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>, StorageError> {
        let store = self.clone();
        let sql = Dialect::Sqlite.rewrite(sql).into_owned();
        let params = params.to_vec();
        let rows = blocking(move || store.query_blocking(&sql, &params, Some(1))).await?;
        Ok(rows.into_iter().next())
    }

    async fn get_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
        let store = self.clone();
        let sql = Dialect::Sqlite.rewrite(sql).into_owned();
        let params = params.to_vec();
        blocking(move || store.query_blocking(&sql, &params, None)).await
    }

    async fn run_in_transaction(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<RunResult>, StorageError> {
        let store = self.clone();
        let statements: Vec<Statement> = statements
            .iter()
            .map(|s| Statement::new(Dialect::Sqlite.rewrite(&s.sql).into_owned(), s.params.clone()))
            .collect();
        blocking(move || store.transaction_blocking(&statements)).await
    }

    async fn wipe(&self) -> Result<(), StorageError> {
        let store = self.clone();
        blocking(move || store.wipe_blocking()).await
    }

    async fn reconnect(&self) -> Result<(), StorageError> {
        let store = self.clone();
        blocking(move || store.reconnect_blocking()).await
    }

    async fn raw_file(&self) -> Result<Vec<u8>, StorageError> {
        let store = self.clone();
        blocking(move || store.snapshot_blocking()).await
    }
}
