//! Ingestion coordinator: images in, registry rows and a batch summary out.
//!
//! Per file: preprocess, recognize, extract candidates, insert them as one
//! group. Preprocessing failures degrade to the raw image. Recognition or
//! storage failures become that file's error entry and the batch carries on.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt as _};
use notescan_core::{extract_candidates, RecordStatus};
use notescan_storage::{SerialRegistry, TransactionMode};
use notescan_vision::{ImagePreprocessor, RecognitionRequest, Recognizer, VisionError};
use serde::Serialize;
use uuid::Uuid;

use crate::events::{EventBus, FileProgress, IngestEvent};
use crate::{ServiceError, WipeGate};

const DEFAULT_RECOGNITION_TIMEOUT: Duration = Duration::from_secs(60);

/// One uploaded image.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), bytes }
    }
}

/// Result entry for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileOutcome {
    Processed {
        filename: String,
        found: usize,
        #[serde(rename = "new")]
        inserted: usize,
        duplicates: usize,
    },
    Failed {
        filename: String,
        error: String,
        /// Worth resubmitting: the store was busy or briefly unreachable.
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        retryable: bool,
        /// The store failed midway through a non-atomic insert group, so some
        /// of this file's serials may already be registered.
        #[serde(rename = "partialWrites", skip_serializing_if = "std::ops::Not::not")]
        partial_writes: bool,
    },
}

impl FileOutcome {
    pub fn filename(&self) -> &str {
        match self {
            Self::Processed { filename, .. } | Self::Failed { filename, .. } => filename,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub total_candidates: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub results: Vec<FileOutcome>,
}

impl IngestSummary {
    /// Fold per-file outcomes, kept in input order, into batch totals.
    fn from_outcomes(results: Vec<FileOutcome>) -> Self {
        let mut summary = Self::default();
        for outcome in &results {
            if let FileOutcome::Processed { found, inserted, duplicates, .. } = outcome {
                summary.total_candidates = summary.total_candidates.saturating_add(*found);
                summary.inserted = summary.inserted.saturating_add(*inserted);
                summary.duplicates = summary.duplicates.saturating_add(*duplicates);
            }
        }
        summary.results = results;
        summary
    }
}

pub struct IngestionService {
    registry: SerialRegistry,
    recognizer: Arc<dyn Recognizer>,
    preprocessor: ImagePreprocessor,
    request: RecognitionRequest,
    recognition_timeout: Duration,
    concurrency: usize,
    gate: WipeGate,
    events: EventBus,
}

impl IngestionService {
    #[must_use]
    pub fn new(registry: SerialRegistry, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            registry,
            recognizer,
            preprocessor: ImagePreprocessor::default(),
            request: RecognitionRequest::default(),
            recognition_timeout: DEFAULT_RECOGNITION_TIMEOUT,
            concurrency: 1,
            gate: WipeGate::new(),
            events: EventBus::default(),
        }
    }

    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: ImagePreprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    #[must_use]
    pub fn with_request(mut self, request: RecognitionRequest) -> Self {
        self.request = request;
        self
    }

    #[must_use]
    pub fn with_recognition_timeout(mut self, timeout: Duration) -> Self {
        self.recognition_timeout = timeout;
        self
    }

    /// Files processed at once. Clamped to at least 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: WipeGate) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Process a batch. Only request-level problems (no files, wipe in flight)
    /// are errors; per-file failures are reported inside the summary.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestSummary, ServiceError> {
        if files.is_empty() {
            return Err(ServiceError::InvalidInput("no files supplied".into()));
        }
        let _guard = self.gate.enter()?;

        let batch_id = Uuid::new_v4();
        let total = files.len();
        tracing::info!(%batch_id, files = total, concurrency = self.concurrency, "ingestion batch started");

        let outcomes: Vec<FileOutcome> = stream::iter(files.into_iter().enumerate())
            .map(|(index, file)| self.process_file(batch_id, index, total, file))
            .buffered(self.concurrency)
            .collect()
            .await;

        let summary = IngestSummary::from_outcomes(outcomes);
        let failed = summary.results.iter().filter(|r| r.is_failed()).count();
        tracing::info!(
            %batch_id,
            files = total,
            failed,
            total_candidates = summary.total_candidates,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            "ingestion batch completed"
        );
        self.events.publish(IngestEvent::BatchCompleted {
            batch_id,
            files: total,
            failed,
            total_candidates: summary.total_candidates,
            inserted: summary.inserted,
            duplicates: summary.duplicates,
        });
        Ok(summary)
    }

    async fn process_file(
        &self,
        batch_id: Uuid,
        index: usize,
        total: usize,
        file: UploadedFile,
    ) -> FileOutcome {
        let UploadedFile { filename, bytes } = file;
        self.events.publish(IngestEvent::FileStarted {
            batch_id,
            filename: filename.clone(),
            index,
            total,
        });

        match self.recognize_and_store(batch_id, &filename, bytes).await {
            Ok((found, tally)) => {
                tracing::info!(
                    filename = %filename,
                    found,
                    inserted = tally.inserted,
                    duplicates = tally.duplicates,
                    "file processed"
                );
                self.events.publish(IngestEvent::FileCompleted {
                    batch_id,
                    filename: filename.clone(),
                    found,
                    inserted: tally.inserted,
                    duplicates: tally.duplicates,
                });
                FileOutcome::Processed {
                    filename,
                    found,
                    inserted: tally.inserted,
                    duplicates: tally.duplicates,
                }
            },
            Err(e) => {
                let retryable = e.is_transient();
                let partial_writes = matches!(e, ServiceError::Storage(_))
                    && self.registry.transaction_mode() == TransactionMode::BestEffort;
                if matches!(e, ServiceError::Storage(_)) {
                    tracing::error!(
                        filename = %filename,
                        error = %e,
                        retryable,
                        partial_writes,
                        transaction_mode = ?self.registry.transaction_mode(),
                        "storing candidates failed"
                    );
                } else {
                    tracing::warn!(filename = %filename, error = %e, "file failed");
                }
                let error = e.to_string();
                self.events.publish(IngestEvent::FileFailed {
                    batch_id,
                    filename: filename.clone(),
                    error: error.clone(),
                });
                FileOutcome::Failed { filename, error, retryable, partial_writes }
            },
        }
    }

    async fn recognize_and_store(
        &self,
        batch_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(usize, notescan_storage::InsertTally), ServiceError> {
        let preprocessor = self.preprocessor;
        let prepared = tokio::task::spawn_blocking(move || preprocessor.preprocess(&bytes))
            .await
            .map_err(|e| ServiceError::Task(format!("preprocessing task: {e}")))?;

        let observer = FileProgress { bus: &self.events, batch_id, filename };
        let recognition = tokio::time::timeout(
            self.recognition_timeout,
            self.recognizer.recognize(&prepared, &self.request, &observer),
        )
        .await
        .map_err(|_| VisionError::Timeout(self.recognition_timeout))??;
        drop(prepared);

        let candidates: Vec<String> = extract_candidates(&recognition.text).into_iter().collect();
        tracing::debug!(
            filename = %filename,
            candidates = candidates.len(),
            confidence = ?recognition.confidence,
            "candidates extracted"
        );

        let tally =
            self.registry.insert_new(&candidates, filename, RecordStatus::Confirmed).await?;
        Ok((candidates.len(), tally))
    }
}
