#![allow(clippy::unwrap_used, reason = "test code")]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notescan_core::{RecordStatus, WIPE_CONFIRMATION};
use notescan_storage::{
    BackendKind, RegistryStore, Row, RunResult, SerialRegistry, SqlValue, SqliteStore, Statement,
    StorageError, TransactionMode,
};
use notescan_vision::{
    ProgressObserver, Recognition, RecognitionProgress, RecognitionRequest, Recognizer,
    VisionError,
};
use tempfile::TempDir;

use crate::{
    ExportFormat, FileOutcome, IngestEvent, IngestionService, ReconcileService, RegistryService,
    ServiceError, UploadedFile, WipeGate,
};

/// Reads the "image" as UTF-8 text. `FAIL` is an unavailable engine, `SLOW`
/// never finishes in time.
struct ScriptedRecognizer;

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        image: &[u8],
        _request: &RecognitionRequest,
        observer: &dyn ProgressObserver,
    ) -> Result<Recognition, VisionError> {
        observer.on_progress(RecognitionProgress::new("recognizing text", 0.5));
        let text = String::from_utf8_lossy(image).into_owned();
        match text.as_str() {
            "FAIL" => Err(VisionError::Unavailable("scripted failure".into())),
            "SLOW" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Recognition::default())
            },
            _ => Ok(Recognition { text, confidence: Some(90.0) }),
        }
    }
}

struct Harness {
    registry: SerialRegistry,
    gate: WipeGate,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&dir.path().join("registry.db"), 4).unwrap();
        Self { registry: SerialRegistry::new(Arc::new(store)), gate: WipeGate::new(), _dir: dir }
    }

    fn ingestion(&self) -> IngestionService {
        IngestionService::new(self.registry.clone(), Arc::new(ScriptedRecognizer))
            .with_gate(self.gate.clone())
    }

    fn reconcile(&self) -> ReconcileService {
        ReconcileService::new(self.registry.clone(), self.gate.clone())
    }

    fn registry_service(&self) -> RegistryService {
        RegistryService::new(self.registry.clone(), self.gate.clone())
    }
}

fn file(name: &str, text: &str) -> UploadedFile {
    UploadedFile::new(name, text.as_bytes().to_vec())
}

fn three_files() -> Vec<UploadedFile> {
    vec![
        file("file1", "LB42836549R some noise MF71554741C LB42836549R"),
        file("file2", "FAIL"),
        file("file3", "LB42836549R and ZZ12345678Q"),
    ]
}

#[tokio::test]
async fn failed_file_does_not_abort_batch() {
    let h = Harness::new();
    let summary = h.ingestion().ingest(three_files()).await.unwrap();

    assert_eq!(summary.total_candidates, 4);
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.results.len(), 3);
    assert_eq!(
        summary.results[0],
        FileOutcome::Processed { filename: "file1".into(), found: 2, inserted: 2, duplicates: 0 }
    );
    assert!(matches!(&summary.results[1], FileOutcome::Failed { filename, .. } if filename == "file2"));
    assert_eq!(
        summary.results[2],
        FileOutcome::Processed { filename: "file3".into(), found: 2, inserted: 1, duplicates: 1 }
    );

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["totalCandidates"], 4);
    assert_eq!(json["results"][0]["new"], 2);
    assert!(json["results"][1]["error"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn reingesting_counts_duplicates() {
    let h = Harness::new();
    let service = h.ingestion();
    service.ingest(vec![file("a.jpg", "LB42836549R")]).await.unwrap();
    let again = service.ingest(vec![file("b.jpg", "LB42836549R")]).await.unwrap();

    assert_eq!((again.inserted, again.duplicates), (0, 1));
    let record = h.registry.get_by_serial("LB42836549R").await.unwrap().unwrap();
    assert_eq!(record.source_filename.as_deref(), Some("a.jpg"));
    assert_eq!(record.status, RecordStatus::Confirmed);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let h = Harness::new();
    assert!(matches!(h.ingestion().ingest(Vec::new()).await, Err(ServiceError::InvalidInput(_))));
}

#[tokio::test]
async fn concurrent_processing_keeps_input_order() {
    let h = Harness::new();
    let files: Vec<UploadedFile> = (0..6)
        .map(|i| file(&format!("f{i}"), &format!("AB1234567{i}C")))
        .collect();
    let summary = h.ingestion().with_concurrency(3).ingest(files).await.unwrap();

    let names: Vec<&str> = summary.results.iter().map(FileOutcome::filename).collect();
    assert_eq!(names, ["f0", "f1", "f2", "f3", "f4", "f5"]);
    assert_eq!(summary.inserted, 6);
}

#[tokio::test]
async fn recognition_timeout_is_a_file_error() {
    let h = Harness::new();
    let summary = h
        .ingestion()
        .with_recognition_timeout(Duration::from_millis(50))
        .ingest(vec![file("slow.jpg", "SLOW"), file("ok.jpg", "LB42836549R")])
        .await
        .unwrap();

    assert!(matches!(&summary.results[0], FileOutcome::Failed { error, .. } if error.contains("timed out")));
    assert_eq!(summary.inserted, 1);
}

#[tokio::test]
async fn progress_events_are_published() {
    let h = Harness::new();
    let service = h.ingestion();
    let mut rx = service.events().subscribe();
    service.ingest(three_files()).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            IngestEvent::FileStarted { .. } => "started",
            IngestEvent::Recognition { .. } => "recognition",
            IngestEvent::FileCompleted { .. } => "completed",
            IngestEvent::FileFailed { .. } => "failed",
            IngestEvent::BatchCompleted { .. } => "batch",
        });
    }
    assert_eq!(kinds.iter().filter(|k| **k == "completed").count(), 2);
    assert_eq!(kinds.iter().filter(|k| **k == "failed").count(), 1);
    assert_eq!(kinds.last(), Some(&"batch"));
}

#[tokio::test]
async fn wipe_requires_confirmation() {
    let h = Harness::new();
    h.ingestion().ingest(vec![file("a.jpg", "LB42836549R")]).await.unwrap();
    let service = h.registry_service();

    assert!(matches!(service.wipe(None).await, Err(ServiceError::ConfirmationRequired(_))));
    assert!(matches!(service.wipe(Some("yes")).await, Err(ServiceError::ConfirmationRequired(_))));
    assert_eq!(service.list_serials().await.unwrap(), ["LB42836549R"]);

    service.wipe(Some(WIPE_CONFIRMATION)).await.unwrap();
    assert!(service.list_serials().await.unwrap().is_empty());
}

#[tokio::test]
async fn wipe_and_writes_exclude_each_other() {
    let h = Harness::new();
    let writer = h.gate.enter().unwrap();
    assert!(matches!(
        h.registry_service().wipe(Some(WIPE_CONFIRMATION)).await,
        Err(ServiceError::Busy(_))
    ));
    drop(writer);

    let wipe = h.gate.exclusive().unwrap();
    assert!(matches!(
        h.ingestion().ingest(vec![file("a.jpg", "LB42836549R")]).await,
        Err(ServiceError::Busy(_))
    ));
    assert!(matches!(h.reconcile().import_csv("AB12345678C").await, Err(ServiceError::Busy(_))));
    drop(wipe);
}

#[tokio::test]
async fn csv_export_import_round_trip() {
    let source = Harness::new();
    source
        .ingestion()
        .ingest(vec![file("wallet, front.jpg", "LB42836549R MF71554741C")])
        .await
        .unwrap();
    source.registry_service().add_manual(&["zz-00000000-z".to_owned()]).await.unwrap();
    let flagged = source.registry.get_by_serial("MF71554741C").await.unwrap().unwrap();
    source.registry_service().edit(flagged.id, "MF71554741C", Some(RecordStatus::Flagged)).await.unwrap();

    let csv = source.reconcile().export_csv().await.unwrap();

    let target = Harness::new();
    let report = target.reconcile().import_csv(&csv).await.unwrap();
    assert_eq!((report.processed, report.inserted, report.updated, report.skipped), (3, 3, 0, 0));

    let snapshot = |records: Vec<notescan_core::SerialRecord>| -> BTreeSet<(String, &'static str, Option<String>)> {
        records.into_iter().map(|r| (r.serial_number, r.status.as_str(), r.source_filename)).collect()
    };
    assert_eq!(
        snapshot(source.registry.all_records().await.unwrap()),
        snapshot(target.registry.all_records().await.unwrap())
    );
}

#[tokio::test]
async fn round_trip_keeps_filenames_with_line_breaks() {
    let source = Harness::new();
    source.ingestion().ingest(vec![file("front\nback.jpg", "LB42836549R")]).await.unwrap();
    let flagged = source.registry.get_by_serial("LB42836549R").await.unwrap().unwrap();
    source.registry_service().edit(flagged.id, "LB42836549R", Some(RecordStatus::Flagged)).await.unwrap();

    let csv = source.reconcile().export_csv().await.unwrap();
    let target = Harness::new();
    let report = target.reconcile().import_csv(&csv).await.unwrap();

    assert_eq!((report.processed, report.inserted, report.skipped), (1, 1, 0));
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(target.registry.list_serials().await.unwrap(), ["LB42836549R"]);
    let imported = target.registry.get_by_serial("LB42836549R").await.unwrap().unwrap();
    assert_eq!(imported.source_filename.as_deref(), Some("front\nback.jpg"));
    assert_eq!(imported.status, RecordStatus::Flagged);
    assert_eq!(imported.extracted_at, flagged.extracted_at);
}

#[tokio::test]
async fn import_overwrites_existing_and_defaults_new() {
    let h = Harness::new();
    h.ingestion().ingest(vec![file("scan.jpg", "LB42836549R")]).await.unwrap();

    let csv = "serial_number,source_filename,extracted_at,status\n\
               LB42836549R,ledger.csv,2020-01-01T00:00:00.000Z,flagged\n\
               AB12345678C\n\
               ,orphan.jpg\n";
    let report = h.reconcile().import_csv(csv).await.unwrap();
    assert_eq!((report.processed, report.inserted, report.updated, report.skipped), (2, 1, 1, 1));

    let overwritten = h.registry.get_by_serial("LB42836549R").await.unwrap().unwrap();
    assert_eq!(overwritten.status, RecordStatus::Flagged);
    assert_eq!(overwritten.source_filename.as_deref(), Some("ledger.csv"));
    assert_eq!(overwritten.extracted_at.to_rfc3339(), "2020-01-01T00:00:00+00:00");

    let fresh = h.registry.get_by_serial("AB12345678C").await.unwrap().unwrap();
    assert_eq!(fresh.status, RecordStatus::Imported);
    assert_eq!(fresh.source_filename.as_deref(), Some("csv_import"));
}

#[tokio::test]
async fn headerless_import_treats_first_line_as_data() {
    let h = Harness::new();
    let report = h.reconcile().import_csv("AB12345678C\nZZ00000000Z\n").await.unwrap();
    assert_eq!(report.inserted, 2);
}

#[tokio::test]
async fn exports_render_every_format() {
    let h = Harness::new();
    h.registry_service().add_manual(&["AB12345678C".to_owned()]).await.unwrap();
    let reconcile = h.reconcile();

    let csv = reconcile.export("csv".parse().unwrap()).await.unwrap();
    assert!(csv.filename.ends_with(".csv"));
    assert!(String::from_utf8(csv.bytes).unwrap().contains("AB12345678C,manual_entry,"));

    let sql = reconcile.export(ExportFormat::Sql).await.unwrap();
    assert!(String::from_utf8(sql.bytes).unwrap().contains("INSERT INTO serials"));

    let db = reconcile.export(ExportFormat::Db).await.unwrap();
    assert!(db.bytes.starts_with(b"SQLite format 3\0"));

    assert!(matches!("xlsx".parse::<ExportFormat>(), Err(ServiceError::InvalidInput(_))));
}

#[tokio::test]
async fn manual_add_canonicalizes_and_counts() {
    let h = Harness::new();
    let service = h.registry_service();
    let result = service
        .add_manual(&["ab-1234 5678c".to_owned(), "AB12345678C".to_owned(), "---".to_owned()])
        .await
        .unwrap();
    assert_eq!((result.added, result.duplicates, result.skipped), (1, 1, 1));

    assert!(matches!(service.add_manual(&[]).await, Err(ServiceError::InvalidInput(_))));
}

#[tokio::test]
async fn edit_reports_not_found_and_conflict() {
    let h = Harness::new();
    let service = h.registry_service();
    service.add_manual(&["AB12345678C".to_owned(), "ZZ00000000Z".to_owned()]).await.unwrap();
    let record = h.registry.get_by_serial("AB12345678C").await.unwrap().unwrap();

    let err = service.edit(9999, "QQ11111111Q", Some(RecordStatus::Confirmed)).await.unwrap_err();
    assert!(err.is_not_found());

    let err = service.edit(record.id, "zz00000000z", Some(RecordStatus::Confirmed)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let edited = service.edit(record.id, "ab12345678d", Some(RecordStatus::Flagged)).await.unwrap();
    assert_eq!(edited.serial_number, "AB12345678D");
    assert_eq!(edited.status, RecordStatus::Flagged);
}

#[tokio::test]
async fn edit_without_status_keeps_it() {
    let h = Harness::new();
    let service = h.registry_service();
    service.add_manual(&["AB12345678C".to_owned()]).await.unwrap();
    let record = h.registry.get_by_serial("AB12345678C").await.unwrap().unwrap();
    service.edit(record.id, "AB12345678C", Some(RecordStatus::Flagged)).await.unwrap();

    let edited = service.edit(record.id, "AB12345678D", None).await.unwrap();
    assert_eq!(edited.serial_number, "AB12345678D");
    assert_eq!(edited.status, RecordStatus::Flagged);
}

/// A store whose writes always fail, reporting the given transaction mode.
struct BrokenStore(TransactionMode);

#[async_trait]
impl RegistryStore for BrokenStore {
    fn kind(&self) -> BackendKind {
        match self.0 {
            TransactionMode::Atomic => BackendKind::Embedded,
            TransactionMode::BestEffort => BackendKind::Networked,
        }
    }

    fn transaction_mode(&self) -> TransactionMode {
        self.0
    }

    async fn run(&self, _sql: &str, _params: &[SqlValue]) -> Result<RunResult, StorageError> {
        Err(StorageError::Closed)
    }

    async fn get_one(&self, _sql: &str, _params: &[SqlValue]) -> Result<Option<Row>, StorageError> {
        Ok(None)
    }

    async fn get_all(&self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
        Ok(Vec::new())
    }

    async fn run_in_transaction(&self, _statements: &[Statement]) -> Result<Vec<RunResult>, StorageError> {
        Err(StorageError::Closed)
    }

    async fn wipe(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn raw_file(&self) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::Unsupported("raw file"))
    }
}

#[tokio::test]
async fn best_effort_store_failure_flags_partial_writes() {
    let registry = SerialRegistry::new(Arc::new(BrokenStore(TransactionMode::BestEffort)));
    let service = IngestionService::new(registry, Arc::new(ScriptedRecognizer));
    let summary = service
        .ingest(vec![file("a.jpg", "LB42836549R"), file("b.jpg", "FAIL")])
        .await
        .unwrap();

    assert!(matches!(
        &summary.results[0],
        FileOutcome::Failed { partial_writes: true, retryable: false, .. }
    ));
    assert!(matches!(&summary.results[1], FileOutcome::Failed { partial_writes: false, .. }));

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["results"][0]["partialWrites"], true);
    assert!(json["results"][1].get("partialWrites").is_none());
    assert!(json["results"][1].get("retryable").is_none());
}

#[tokio::test]
async fn atomic_store_failure_is_not_partial() {
    assert_eq!(Harness::new().registry.transaction_mode(), TransactionMode::Atomic);

    let registry = SerialRegistry::new(Arc::new(BrokenStore(TransactionMode::Atomic)));
    let service = IngestionService::new(registry, Arc::new(ScriptedRecognizer));
    let summary = service.ingest(vec![file("a.jpg", "LB42836549R")]).await.unwrap();
    assert!(matches!(
        &summary.results[0],
        FileOutcome::Failed { partial_writes: false, retryable: false, error, .. } if error.contains("closed")
    ));
}

#[tokio::test]
async fn delete_missing_serial_is_not_found() {
    let h = Harness::new();
    let service = h.registry_service();
    service.add_manual(&["AB12345678C".to_owned()]).await.unwrap();

    service.delete("AB12345678C").await.unwrap();
    assert!(service.delete("AB12345678C").await.unwrap_err().is_not_found());
}
