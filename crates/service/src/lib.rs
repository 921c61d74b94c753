//! Service layer for notescan
//!
//! Business logic between the HTTP/CLI surfaces and storage/vision: the
//! ingestion coordinator, the bulk reconciler and direct registry operations.

#![allow(missing_docs, reason = "Internal crate with self-explanatory API")]
#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(missing_debug_implementations, reason = "Internal types")]
#![allow(clippy::let_underscore_untyped, reason = "Type is clear from context")]
#![allow(clippy::missing_docs_in_private_items, reason = "Internal crate")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::min_ident_chars, reason = "Short error vars are idiomatic")]
#![allow(clippy::arithmetic_side_effects, reason = "Counts are bounded by batch sizes")]

pub mod csv_format;
mod error;
mod events;
mod gate;
mod ingest;
mod reconcile;
mod registry_service;

#[cfg(test)]
mod tests;

pub use error::ServiceError;
pub use events::{EventBus, IngestEvent, EVENT_CHANNEL_CAPACITY};
pub use gate::WipeGate;
pub use ingest::{FileOutcome, IngestSummary, IngestionService, UploadedFile};
pub use reconcile::{ExportFile, ExportFormat, ImportReport, ReconcileService};
pub use registry_service::{ManualAddResult, RegistryService};
