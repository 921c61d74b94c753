//! Bulk export and import of the registry.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use notescan_storage::{BackendKind, SerialRegistry};
use serde::Serialize;

use crate::csv_format::{
    is_header_line, parse_import_line, render_csv, render_sql, split_csv_records, ParsedLine,
};
use crate::{ServiceError, WipeGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Sql,
    /// Raw single-file database copy; embedded backend only.
    Db,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Sql => "sql",
            Self::Db => "db",
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Sql => "application/sql; charset=utf-8",
            Self::Db => "application/vnd.sqlite3",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "sql" => Ok(Self::Sql),
            "db" | "sqlite" => Ok(Self::Db),
            other => Err(ServiceError::InvalidInput(format!(
                "unknown export format {other:?}, expected csv, sql or db"
            ))),
        }
    }
}

/// A rendered export ready to be written or downloaded.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Data lines that produced a row.
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl ImportReport {
    pub fn message(&self) -> String {
        format!(
            "Imported {} rows: {} new, {} updated, {} skipped",
            self.processed, self.inserted, self.updated, self.skipped
        )
    }
}

pub struct ReconcileService {
    registry: SerialRegistry,
    gate: WipeGate,
}

impl ReconcileService {
    #[must_use]
    pub fn new(registry: SerialRegistry, gate: WipeGate) -> Self {
        Self { registry, gate }
    }

    pub async fn export(&self, format: ExportFormat) -> Result<ExportFile, ServiceError> {
        let bytes = match format {
            ExportFormat::Csv => self.export_csv().await?.into_bytes(),
            ExportFormat::Sql => self.export_sql().await?.into_bytes(),
            ExportFormat::Db => self.export_raw().await?,
        };
        let filename =
            format!("serials-{}.{}", Utc::now().format("%Y%m%d-%H%M%S"), format.extension());
        tracing::info!(%format, bytes = bytes.len(), "registry exported");
        Ok(ExportFile { filename, content_type: format.content_type(), bytes })
    }

    pub async fn export_csv(&self) -> Result<String, ServiceError> {
        Ok(render_csv(&self.registry.all_records().await?))
    }

    pub async fn export_sql(&self) -> Result<String, ServiceError> {
        Ok(render_sql(&self.registry.all_records().await?, Utc::now()))
    }

    pub async fn export_raw(&self) -> Result<Vec<u8>, ServiceError> {
        if self.registry.kind() != BackendKind::Embedded {
            return Err(ServiceError::InvalidInput(
                "raw database export is only available on the embedded backend".into(),
            ));
        }
        Ok(self.registry.raw_file().await?)
    }

    /// Upsert every parseable record. Existing serials are overwritten;
    /// records without a serial are skipped and counted. Quoted fields may
    /// span lines.
    pub async fn import_csv(&self, text: &str) -> Result<ImportReport, ServiceError> {
        let _guard = self.gate.enter()?;
        let now = Utc::now();
        let mut report = ImportReport::default();
        let mut rows = Vec::new();

        let records = split_csv_records(text.trim_start_matches('\u{feff}'));
        for (idx, (line_no, raw)) in records.into_iter().enumerate() {
            let record = raw.trim();
            if record.is_empty() || (idx == 0 && is_header_line(record)) {
                continue;
            }
            match parse_import_line(record, now) {
                ParsedLine::Row { row, warning } => {
                    if let Some(warning) = warning {
                        report.warnings.push(warning);
                    }
                    rows.push(row);
                },
                ParsedLine::Skipped(reason) => {
                    tracing::warn!(line = line_no, %reason, "import line skipped");
                    report.skipped = report.skipped.saturating_add(1);
                    report.warnings.push(reason);
                },
            }
        }

        report.processed = rows.len();
        let tally = self.registry.upsert_imported(&rows).await?;
        report.inserted = tally.inserted;
        report.updated = tally.updated;
        tracing::info!(
            processed = report.processed,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            "CSV import completed"
        );
        Ok(report)
    }
}
