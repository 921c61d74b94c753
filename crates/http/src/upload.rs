//! Multipart upload collection.

use axum::extract::Multipart;
use notescan_service::UploadedFile;

use crate::api_error::ApiError;

/// Every file part of a multipart body, in order. Text parts are ignored.
pub async fn collect_files(multipart: &mut Multipart) -> Result<Vec<UploadedFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(ToOwned::to_owned) else {
            continue;
        };
        let bytes = field.bytes().await?;
        tracing::debug!(filename = %filename, bytes = bytes.len(), "upload received");
        files.push(UploadedFile::new(filename, bytes.to_vec()));
    }
    Ok(files)
}
