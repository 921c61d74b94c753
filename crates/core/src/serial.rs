//! The persisted serial record and its canonical form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ParseStatusError;

/// Lifecycle state of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Entered through OCR ingestion or manual add.
    #[default]
    Confirmed,
    /// Loaded from a CSV import without an explicit status.
    Imported,
    /// Marked for review.
    Flagged,
}

impl RecordStatus {
    pub const ALL: [Self; 3] = [Self::Confirmed, Self::Imported, Self::Flagged];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Confirmed => "confirmed",
            Self::Imported => "imported",
            Self::Flagged => "flagged",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(Self::Confirmed),
            "imported" => Ok(Self::Imported),
            "flagged" => Ok(Self::Flagged),
            _ => Err(ParseStatusError(s.to_owned())),
        }
    }
}

/// A row of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialRecord {
    pub id: i64,
    pub serial_number: String,
    pub source_filename: Option<String>,
    pub extracted_at: DateTime<Utc>,
    pub status: RecordStatus,
}

/// Canonical form of a serial: ASCII alphanumerics only, uppercased.
///
/// Returns `None` when nothing survives.
#[must_use]
pub fn canonicalize_serial(raw: &str) -> Option<String> {
    let canonical: String = raw
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if canonical.is_empty() { None } else { Some(canonical) }
}
