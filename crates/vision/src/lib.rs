//! Vision layer for notescan
//!
//! Turns a raw photograph into recognized text: [`ImagePreprocessor`] normalizes
//! the image, a [`Recognizer`] reads it. [`TesseractRecognizer`] drives the
//! Tesseract command-line engine.

mod error;
mod preprocess;
mod recognize;
mod tesseract;

pub use error::VisionError;
pub use preprocess::{ImagePreprocessor, DEFAULT_TARGET_WIDTH};
pub use recognize::{
    NoopObserver, ProgressObserver, Recognition, RecognitionProgress, RecognitionRequest,
    Recognizer,
};
pub use tesseract::TesseractRecognizer;
