//! Candidate extraction from recognized text.
//!
//! The serial grammar is two letters, eight digits, one letter. Recognized text
//! is reduced to ASCII alphanumerics and whitespace before matching, so
//! formatting noise inside a token (`LB-42836549-R`) collapses while word
//! boundaries between tokens survive.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

#[expect(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static SERIAL_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2}[0-9]{8}[A-Z]\b").unwrap());

#[expect(clippy::unwrap_used, reason = "static regex pattern is compile-time validated")]
static SERIAL_EXACT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}[0-9]{8}[A-Z]$").unwrap());

/// Drop everything except ASCII alphanumerics and whitespace, then uppercase.
fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Extract the set of serial candidates found in `raw`.
///
/// Pure and deterministic: repeated detections collapse to one entry and the
/// result is ordered.
#[must_use]
pub fn extract_candidates(raw: &str) -> BTreeSet<String> {
    let normalized = normalize(raw);
    SERIAL_TOKEN_REGEX.find_iter(&normalized).map(|m| m.as_str().to_owned()).collect()
}

/// Whether `s` is exactly one serial in canonical form.
#[must_use]
pub fn is_serial_candidate(s: &str) -> bool {
    SERIAL_EXACT_REGEX.is_match(s)
}
