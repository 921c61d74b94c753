//! Typed serial registry on top of any [`RegistryStore`].
//!
//! Every query here is written once in the common `?` dialect; backends do the
//! placeholder rewriting and conflict mapping.

// Registry counts and page arithmetic are bounded by row counts
#![allow(
    clippy::arithmetic_side_effects,
    reason = "pagination math is bounded by MAX_PAGE_LIMIT and row counts"
)]

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use notescan_core::{canonicalize_serial, RecordStatus, SerialRecord, MAX_PAGE_LIMIT};
use serde::Serialize;

use crate::traits::{BackendKind, RegistryStore, TransactionMode};
use crate::{Row, RunResult, SqlValue, Statement, StorageError};

const RECORD_COLUMNS: &str = "id, serial_number, source_filename, extracted_at, status";

const INSERT_NEW_SQL: &str =
    "INSERT INTO serials (serial_number, source_filename, status) VALUES (?, ?, ?)";

const UPSERT_IMPORT_SQL: &str = "INSERT INTO serials (serial_number, source_filename, extracted_at, status) \
     VALUES (?, ?, ?, ?) \
     ON CONFLICT (serial_number) DO UPDATE SET \
     source_filename = excluded.source_filename, \
     extracted_at = excluded.extracted_at, \
     status = excluded.status";

const SEARCH_FILTER: &str = " WHERE serial_number LIKE ? ESCAPE '\\' \
     OR LOWER(COALESCE(source_filename, '')) LIKE ? ESCAPE '\\'";

/// Bound on `IN (...)` list length per lookup query.
const LOOKUP_CHUNK: usize = 500;

/// New-versus-duplicate outcome of a non-overwriting insert group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InsertTally {
    pub inserted: usize,
    pub duplicates: usize,
}

/// New-versus-overwritten outcome of an import upsert group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct UpsertTally {
    pub inserted: usize,
    pub updated: usize,
}

/// One row destined for an authoritative upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub serial_number: String,
    pub source_filename: Option<String>,
    pub extracted_at: DateTime<Utc>,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current: usize,
    pub limit: usize,
    pub total_records: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordPage {
    pub data: Vec<SerialRecord>,
    pub pagination: Pagination,
}

/// Counts computed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    pub total: u64,
    pub confirmed: u64,
    pub imported: u64,
    pub flagged: u64,
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn count_to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn usize_to_i64(val: usize) -> i64 {
    i64::try_from(val).unwrap_or(i64::MAX)
}

pub(crate) fn row_to_record(row: &Row) -> Result<SerialRecord, StorageError> {
    let status_str = row.text("status")?;
    let status = status_str.parse::<RecordStatus>().unwrap_or_else(|_| {
        tracing::warn!(invalid_status = %status_str, "corrupt status in registry, defaulting to confirmed");
        RecordStatus::Confirmed
    });
    Ok(SerialRecord {
        id: row.integer("id")?,
        serial_number: row.text("serial_number")?,
        source_filename: row.opt_text("source_filename")?,
        extracted_at: row.timestamp("extracted_at")?,
        status,
    })
}

#[derive(Clone)]
pub struct SerialRegistry {
    store: Arc<dyn RegistryStore>,
}

impl std::fmt::Debug for SerialRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialRegistry").field("backend", &self.store.kind()).finish()
    }
}

impl SerialRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    pub fn kind(&self) -> BackendKind {
        self.store.kind()
    }

    pub fn transaction_mode(&self) -> TransactionMode {
        self.store.transaction_mode()
    }

    /// Insert each serial unless it already exists. Never overwrites.
    ///
    /// The group runs as one `run_in_transaction` call; a zero-row result is a
    /// duplicate.
    pub async fn insert_new(
        &self,
        serials: &[String],
        source_filename: &str,
        status: RecordStatus,
    ) -> Result<InsertTally, StorageError> {
        if serials.is_empty() {
            return Ok(InsertTally::default());
        }
        let statements: Vec<Statement> = serials
            .iter()
            .map(|serial| {
                Statement::new(
                    INSERT_NEW_SQL,
                    vec![
                        SqlValue::from(serial.as_str()),
                        SqlValue::from(source_filename),
                        SqlValue::from(status.as_str()),
                    ],
                )
            })
            .collect();
        let results = self.store.run_in_transaction(&statements).await?;
        let inserted = results.iter().filter(|r| r.changed()).count();
        Ok(InsertTally { inserted, duplicates: results.len() - inserted })
    }

    /// Which of `serials` are already registered.
    pub async fn existing_serials<'a>(
        &self,
        serials: impl IntoIterator<Item = &'a str>,
    ) -> Result<HashSet<String>, StorageError> {
        let wanted: Vec<&str> = serials.into_iter().collect();
        let mut found = HashSet::new();
        for chunk in wanted.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql =
                format!("SELECT serial_number FROM serials WHERE serial_number IN ({placeholders})");
            let params: Vec<SqlValue> = chunk.iter().map(|s| SqlValue::from(*s)).collect();
            for row in self.store.get_all(&sql, &params).await? {
                found.insert(row.text("serial_number")?);
            }
        }
        Ok(found)
    }

    /// Upsert import rows; on conflict the imported filename, timestamp and
    /// status overwrite the stored ones.
    pub async fn upsert_imported(&self, rows: &[ImportRow]) -> Result<UpsertTally, StorageError> {
        if rows.is_empty() {
            return Ok(UpsertTally::default());
        }
        let mut known =
            self.existing_serials(rows.iter().map(|r| r.serial_number.as_str())).await?;
        let statements: Vec<Statement> = rows
            .iter()
            .map(|row| {
                Statement::new(
                    UPSERT_IMPORT_SQL,
                    vec![
                        SqlValue::from(row.serial_number.as_str()),
                        SqlValue::from(row.source_filename.clone()),
                        SqlValue::from(row.extracted_at),
                        SqlValue::from(row.status.as_str()),
                    ],
                )
            })
            .collect();
        let results = self.store.run_in_transaction(&statements).await?;

        let mut tally = UpsertTally::default();
        for (row, result) in rows.iter().zip(&results) {
            if !result.changed() {
                continue;
            }
            if known.insert(row.serial_number.clone()) {
                tally.inserted += 1;
            } else {
                tally.updated += 1;
            }
        }
        Ok(tally)
    }

    /// Every serial, alphabetically.
    pub async fn list_serials(&self) -> Result<Vec<String>, StorageError> {
        let rows = self
            .store
            .get_all("SELECT serial_number FROM serials ORDER BY serial_number", &[])
            .await?;
        rows.iter().map(|row| row.text("serial_number")).collect()
    }

    /// Every record in insertion order.
    pub async fn all_records(&self) -> Result<Vec<SerialRecord>, StorageError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM serials ORDER BY id");
        let rows = self.store.get_all(&sql, &[]).await?;
        rows.iter().map(row_to_record).collect()
    }

    /// One page of records, newest first, optionally filtered by a serial or
    /// filename substring. `page` is 1-based; `limit` is clamped to
    /// `1..=MAX_PAGE_LIMIT`.
    pub async fn page(
        &self,
        page: usize,
        limit: usize,
        query: Option<&str>,
    ) -> Result<RecordPage, StorageError> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);
        let offset = (page - 1).saturating_mul(limit);

        let term = query.map(str::trim).filter(|q| !q.is_empty());
        let (filter, mut params) = match term {
            Some(q) => {
                let serial_term = canonicalize_serial(q).unwrap_or_else(|| q.to_ascii_uppercase());
                (
                    SEARCH_FILTER,
                    vec![
                        SqlValue::from(format!("%{}%", escape_like(&serial_term))),
                        SqlValue::from(format!("%{}%", escape_like(&q.to_lowercase()))),
                    ],
                )
            },
            None => ("", Vec::new()),
        };

        let count_sql = format!("SELECT COUNT(*) AS total FROM serials{filter}");
        let total = self
            .store
            .get_one(&count_sql, &params)
            .await?
            .map(|row| row.integer("total"))
            .transpose()?
            .map_or(0, count_to_u64);

        let data_sql = format!(
            "SELECT {RECORD_COLUMNS} FROM serials{filter} ORDER BY extracted_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        params.push(SqlValue::Integer(usize_to_i64(limit)));
        params.push(SqlValue::Integer(usize_to_i64(offset)));
        let rows = self.store.get_all(&data_sql, &params).await?;
        let data = rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()?;

        let limit_u64 = u64::try_from(limit).unwrap_or(u64::MAX);
        Ok(RecordPage {
            data,
            pagination: Pagination {
                current: page,
                limit,
                total_records: total,
                total_pages: total.div_ceil(limit_u64),
            },
        })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<SerialRecord>, StorageError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM serials WHERE id = ?");
        let row = self.store.get_one(&sql, &[SqlValue::Integer(id)]).await?;
        row.as_ref().map(row_to_record).transpose()
    }

    pub async fn get_by_serial(&self, serial: &str) -> Result<Option<SerialRecord>, StorageError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM serials WHERE serial_number = ?");
        let row = self.store.get_one(&sql, &[SqlValue::from(serial)]).await?;
        row.as_ref().map(row_to_record).transpose()
    }

    /// Change a record's serial and status. Zero rows when `id` is unknown or the
    /// new serial belongs to another record.
    pub async fn update(
        &self,
        id: i64,
        serial_number: &str,
        status: RecordStatus,
    ) -> Result<RunResult, StorageError> {
        self.store
            .run(
                "UPDATE serials SET serial_number = ?, status = ? WHERE id = ?",
                &[SqlValue::from(serial_number), SqlValue::from(status.as_str()), SqlValue::Integer(id)],
            )
            .await
    }

    /// Returns whether a record was removed.
    pub async fn delete_by_serial(&self, serial_number: &str) -> Result<bool, StorageError> {
        let result = self
            .store
            .run("DELETE FROM serials WHERE serial_number = ?", &[SqlValue::from(serial_number)])
            .await?;
        Ok(result.changed())
    }

    pub async fn stats(&self) -> Result<RegistryStats, StorageError> {
        let rows = self
            .store
            .get_all("SELECT status, COUNT(*) AS count FROM serials GROUP BY status", &[])
            .await?;
        let mut stats = RegistryStats::default();
        for row in &rows {
            let count = count_to_u64(row.integer("count")?);
            stats.total += count;
            match row.text("status")?.parse::<RecordStatus>() {
                Ok(RecordStatus::Confirmed) => stats.confirmed += count,
                Ok(RecordStatus::Imported) => stats.imported += count,
                Ok(RecordStatus::Flagged) => stats.flagged += count,
                Err(e) => tracing::warn!(error = %e, "uncounted status in registry stats"),
            }
        }
        Ok(stats)
    }

    pub async fn wipe(&self) -> Result<(), StorageError> {
        self.store.wipe().await
    }

    pub async fn reconnect(&self) -> Result<(), StorageError> {
        self.store.reconnect().await
    }

    pub async fn raw_file(&self) -> Result<Vec<u8>, StorageError> {
        self.store.raw_file().await
    }
}
