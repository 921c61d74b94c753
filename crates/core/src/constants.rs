//! Shared constants for notescan.

/// Characters the recognizer is allowed to emit.
pub const SERIAL_CHAR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Largest image, in pixels, the preprocessor will produce. Bigger outputs
/// are skipped and the original upload is recognized as-is.
pub const MAX_PREPROCESS_PIXELS: u64 = 40_000_000;

/// Default recognition language.
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Filename recorded for serials added by hand.
pub const MANUAL_ENTRY_SOURCE: &str = "manual_entry";

/// Filename recorded for imported rows that carry none.
pub const CSV_IMPORT_SOURCE: &str = "csv_import";

/// Header line written by the CSV exporter.
pub const CSV_HEADER: &str = "serial_number,source_filename,extracted_at,status";

/// Token whose presence on the first import line marks it as a header.
pub const CSV_HEADER_TOKEN: &str = "serial_number";

/// Confirmation phrase required before wiping the registry.
pub const WIPE_CONFIRMATION: &str = "DELETE-ALL-SERIALS";

/// Maximum page size for paged record reads (DoS protection).
pub const MAX_PAGE_LIMIT: usize = 500;

/// Page size when the caller does not specify one.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Maximum number of serials accepted by one manual batch.
pub const MAX_MANUAL_BATCH: usize = 1000;

/// PostgreSQL connection pool: maximum connections.
pub const PG_POOL_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL connection pool: acquire timeout in seconds.
pub const PG_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// PostgreSQL connection pool: idle timeout in seconds.
pub const PG_POOL_IDLE_TIMEOUT_SECS: u64 = 300;
