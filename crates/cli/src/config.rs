//! Runtime configuration resolved once from the environment.

use std::path::PathBuf;
use std::time::Duration;

use notescan_core::{env_parse_with_default, DEFAULT_OCR_LANGUAGE};
use notescan_storage::StorageConfig;
use notescan_vision::DEFAULT_TARGET_WIDTH;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_POOL_SIZE: u32 = 8;
const DEFAULT_MAX_UPLOAD_MB: usize = 50;
const DEFAULT_OCR_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub storage: StorageConfig,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub tesseract_bin: PathBuf,
    pub ocr_language: String,
    pub ocr_timeout: Duration,
    pub preprocess_width: u32,
    pub ingest_concurrency: usize,
}

impl Config {
    pub(crate) fn from_env() -> Self {
        let database_url = env_string("DATABASE_URL");
        let sqlite_path = env_string("NOTESCAN_DB_PATH").map_or_else(default_db_path, PathBuf::from);
        let max_upload_mb = env_parse_with_default("NOTESCAN_MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB);

        Self {
            storage: StorageConfig {
                database_url,
                sqlite_path,
                sqlite_pool_size: env_parse_with_default("NOTESCAN_DB_POOL_SIZE", DEFAULT_POOL_SIZE)
                    .max(1),
            },
            host: env_string("NOTESCAN_HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            port: env_parse_with_default("NOTESCAN_PORT", DEFAULT_PORT),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            tesseract_bin: env_string("NOTESCAN_TESSERACT_BIN")
                .map_or_else(|| PathBuf::from("tesseract"), PathBuf::from),
            ocr_language: env_string("NOTESCAN_OCR_LANG")
                .unwrap_or_else(|| DEFAULT_OCR_LANGUAGE.to_owned()),
            ocr_timeout: Duration::from_secs(env_parse_with_default(
                "NOTESCAN_OCR_TIMEOUT_SECS",
                DEFAULT_OCR_TIMEOUT_SECS,
            )),
            preprocess_width: env_parse_with_default("NOTESCAN_PREPROCESS_WIDTH", DEFAULT_TARGET_WIDTH),
            ingest_concurrency: env_parse_with_default("NOTESCAN_INGEST_CONCURRENCY", 1_usize),
        }
    }
}

fn env_string(var: &str) -> Option<String> {
    std::env::var(var).ok().map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notescan")
        .join("serials.db")
}
