use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use notescan_service::UploadedFile;

use crate::Services;

/// Read every file up front; an unreadable path aborts before any recognition.
pub(crate) async fn run(services: &Services, paths: &[PathBuf]) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        files.push(UploadedFile::new(display_name(path), bytes));
    }

    let summary = services.ingestion.ingest(files).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
