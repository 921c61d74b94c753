//! Request/query types (Deserialize)

use notescan_core::{RecordStatus, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use serde::Deserialize;

const fn default_page() -> usize {
    1
}

const fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub q: Option<String>,
}

impl RecordsQuery {
    /// Cap limit to prevent DoS via unbounded queries.
    pub fn capped_limit(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }
}

fn default_format() -> String {
    "csv".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchAddRequest {
    pub serials: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub serial_number: String,
    /// Absent keeps the record's current status.
    pub status: Option<RecordStatus>,
}
