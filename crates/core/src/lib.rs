//! Core types for notescan
//!
//! Domain types shared by every other crate: the persisted serial record,
//! canonicalization rules and the candidate extractor that turns raw OCR text
//! into serial-number candidates.

mod constants;
mod env_config;
mod error;
mod extract;
mod serial;
mod timestamp;

pub use constants::*;
pub use env_config::env_parse_with_default;
pub use error::*;
pub use extract::{extract_candidates, is_serial_candidate};
pub use serial::*;
pub use timestamp::{format_timestamp, parse_timestamp};
