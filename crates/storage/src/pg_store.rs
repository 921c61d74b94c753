//! Networked registry store on PostgreSQL via sqlx.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use notescan_core::{
    PG_POOL_ACQUIRE_TIMEOUT_SECS, PG_POOL_IDLE_TIMEOUT_SECS, PG_POOL_MAX_CONNECTIONS,
};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column as _, PgPool, Postgres, Row as _, TypeInfo as _};

use crate::dialect::Dialect;
use crate::pg_migrations::run_pg_migrations;
use crate::traits::{BackendKind, RegistryStore, TransactionMode};
use crate::{Row, RunResult, SqlValue, Statement, StorageError};

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(PG_POOL_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(Duration::from_secs(PG_POOL_IDLE_TIMEOUT_SECS))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        run_pg_migrations(&pool).await.map_err(|e| StorageError::Migration(e.to_string()))?;
        tracing::info!("PgStore initialized");
        Ok(Self { pool })
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Real(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Timestamp(ts) => query.bind(*ts),
        };
    }
    query
}

/// Decode a row by inspecting each column's PostgreSQL type.
fn decode_row(row: &PgRow) -> Result<Row, StorageError> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INT2" => row.try_get::<Option<i16>, _>(idx)?.map(|v| SqlValue::Integer(i64::from(v))),
            "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(|v| SqlValue::Integer(i64::from(v))),
            "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(SqlValue::Integer),
            "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(|v| SqlValue::Integer(i64::from(v))),
            "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(|v| SqlValue::Real(f64::from(v))),
            "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(SqlValue::Real),
            "TIMESTAMPTZ" => {
                row.try_get::<Option<DateTime<Utc>>, _>(idx)?.map(SqlValue::Timestamp)
            },
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(idx)?
                .map(|v| SqlValue::Timestamp(v.and_utc())),
            _ => row.try_get::<Option<String>, _>(idx)?.map(SqlValue::Text),
        };
        columns.push(column.name().to_owned());
        values.push(value.unwrap_or(SqlValue::Null));
    }
    Ok(Row::new(columns, values))
}

#[async_trait]
impl RegistryStore for PgStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Networked
    }

    /// A unique violation aborts a PostgreSQL transaction, which would break
    /// the zero-rows conflict contract, so grouped writes run sequentially.
    fn transaction_mode(&self) -> TransactionMode {
        TransactionMode::BestEffort
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<RunResult, StorageError> {
        let sql = Dialect::Postgres.rewrite(sql);
        match bind_params(sqlx::query(&sql), params).execute(&self.pool).await {
            Ok(result) => Ok(RunResult::new(result.rows_affected())),
            Err(sqlx::Error::Database(ref db_err))
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                tracing::debug!(error = %db_err, "unique constraint hit, reporting zero rows");
                Ok(RunResult::default())
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn get_one(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>, StorageError> {
        let sql = Dialect::Postgres.rewrite(sql);
        let row = bind_params(sqlx::query(&sql), params).fetch_optional(&self.pool).await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn get_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
        let sql = Dialect::Postgres.rewrite(sql);
        let rows = bind_params(sqlx::query(&sql), params).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn run_in_transaction(
        &self,
        statements: &[Statement],
    ) -> Result<Vec<RunResult>, StorageError> {
        let mut results = Vec::with_capacity(statements.len());
        for (applied, stmt) in statements.iter().enumerate() {
            match self.run(&stmt.sql, &stmt.params).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(
                        applied,
                        total = statements.len(),
                        error = %e,
                        "best-effort group stopped; earlier statements remain applied"
                    );
                    return Err(e);
                },
            }
        }
        Ok(results)
    }

    async fn wipe(&self) -> Result<(), StorageError> {
        let deleted = sqlx::query("DELETE FROM serials").execute(&self.pool).await?;
        tracing::info!(deleted = deleted.rows_affected(), "PostgreSQL registry cleared");
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), StorageError> {
        // The sqlx pool re-establishes connections on demand.
        tracing::debug!("reconnect is a no-op on the networked backend");
        Ok(())
    }

    async fn raw_file(&self) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Unsupported("raw database export requires the embedded backend"))
    }
}
