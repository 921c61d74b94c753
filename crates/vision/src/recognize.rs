//! The recognition capability as seen by the pipeline.

use async_trait::async_trait;
use notescan_core::{DEFAULT_OCR_LANGUAGE, SERIAL_CHAR_WHITELIST};
use serde::Serialize;

use crate::VisionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionRequest {
    pub language: String,
    /// Only these characters may appear in the output.
    pub whitelist: String,
}

impl Default for RecognitionRequest {
    fn default() -> Self {
        Self {
            language: DEFAULT_OCR_LANGUAGE.to_owned(),
            whitelist: SERIAL_CHAR_WHITELIST.to_owned(),
        }
    }
}

/// Raw recognized text. Empty or garbage text is a valid result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Recognition {
    pub text: String,
    /// Mean word confidence in `0..=100`, when the engine reports one.
    pub confidence: Option<f32>,
}

/// Progress notification emitted while recognition runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionProgress {
    pub status: String,
    /// Fraction complete in `0.0..=1.0`.
    pub progress: f32,
}

impl RecognitionProgress {
    pub fn new(status: impl Into<String>, progress: f32) -> Self {
        Self { status: status.into(), progress: progress.clamp(0.0, 1.0) }
    }
}

/// Receives progress notifications. Informational only; recognition results
/// never depend on it.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: RecognitionProgress);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _progress: RecognitionProgress) {}
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Read text from an image buffer.
    ///
    /// Returns [`VisionError::Unavailable`] when the engine cannot be invoked,
    /// which callers report per file.
    async fn recognize(
        &self,
        image: &[u8],
        request: &RecognitionRequest,
        observer: &dyn ProgressObserver,
    ) -> Result<Recognition, VisionError>;
}
