use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use notescan_service::ExportFormat;

use crate::Services;

pub(crate) async fn run_import(services: &Services, path: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let report = services.reconcile.import_csv(&text).await?;
    println!("{}", report.message());
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

pub(crate) async fn run_export(services: &Services, format: &str, output: Option<PathBuf>) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    let file = services.reconcile.export(format).await?;
    let path = output.unwrap_or_else(|| PathBuf::from(&file.filename));
    tokio::fs::write(&path, &file.bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}
