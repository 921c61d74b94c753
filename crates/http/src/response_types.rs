//! Response types (Serialize)

use notescan_core::SerialRecord;
use notescan_service::ImportReport;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct EditResponse {
    pub success: bool,
    pub record: SerialRecord,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub serial_number: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub report: ImportReport,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: &'static str,
}
