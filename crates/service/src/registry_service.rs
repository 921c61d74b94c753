//! Direct registry operations: manual adds, edits, deletes, reads and the
//! confirmed wipe.

use notescan_core::{
    canonicalize_serial, RecordStatus, SerialRecord, MANUAL_ENTRY_SOURCE, MAX_MANUAL_BATCH,
    WIPE_CONFIRMATION,
};
use notescan_storage::{BackendKind, RecordPage, RegistryStats, SerialRegistry, TransactionMode};
use serde::Serialize;

use crate::{ServiceError, WipeGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ManualAddResult {
    pub added: usize,
    pub duplicates: usize,
    /// Entries with nothing left after canonicalization.
    pub skipped: usize,
}

pub struct RegistryService {
    registry: SerialRegistry,
    gate: WipeGate,
}

impl RegistryService {
    #[must_use]
    pub fn new(registry: SerialRegistry, gate: WipeGate) -> Self {
        Self { registry, gate }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.registry.kind()
    }

    pub fn transaction_mode(&self) -> TransactionMode {
        self.registry.transaction_mode()
    }

    /// Canonicalize and insert hand-typed serials. Existing serials are
    /// counted as duplicates and left untouched.
    pub async fn add_manual(&self, serials: &[String]) -> Result<ManualAddResult, ServiceError> {
        if serials.is_empty() {
            return Err(ServiceError::InvalidInput("no serials supplied".into()));
        }
        if serials.len() > MAX_MANUAL_BATCH {
            return Err(ServiceError::InvalidInput(format!(
                "at most {MAX_MANUAL_BATCH} serials per batch, got {}",
                serials.len()
            )));
        }
        let _guard = self.gate.enter()?;

        let canonical: Vec<String> = serials.iter().filter_map(|s| canonicalize_serial(s)).collect();
        let skipped = serials.len() - canonical.len();
        let tally = self
            .registry
            .insert_new(&canonical, MANUAL_ENTRY_SOURCE, RecordStatus::Confirmed)
            .await?;
        tracing::info!(added = tally.inserted, duplicates = tally.duplicates, skipped, "manual batch added");
        Ok(ManualAddResult { added: tally.inserted, duplicates: tally.duplicates, skipped })
    }

    /// Change a record's serial, and its status when one is given. Without a
    /// status the stored one is kept.
    pub async fn edit(
        &self,
        id: i64,
        serial_number: &str,
        status: Option<RecordStatus>,
    ) -> Result<SerialRecord, ServiceError> {
        let serial = canonicalize_serial(serial_number)
            .ok_or_else(|| ServiceError::InvalidInput("serial number is empty".into()))?;
        let _guard = self.gate.enter()?;

        let Some(current) = self.registry.get_by_id(id).await? else {
            return Err(ServiceError::not_found("record", id));
        };
        let status = status.unwrap_or(current.status);
        if !self.registry.update(id, &serial, status).await?.changed() {
            return Err(ServiceError::Conflict(format!("serial {serial} already exists")));
        }
        tracing::info!(id, serial = %serial, %status, "record edited");
        self.registry.get_by_id(id).await?.ok_or_else(|| ServiceError::not_found("record", id))
    }

    pub async fn delete(&self, serial_number: &str) -> Result<(), ServiceError> {
        let serial = canonicalize_serial(serial_number)
            .ok_or_else(|| ServiceError::InvalidInput("serial number is empty".into()))?;
        let _guard = self.gate.enter()?;
        if !self.registry.delete_by_serial(&serial).await? {
            return Err(ServiceError::not_found("serial", serial));
        }
        tracing::info!(serial = %serial, "record deleted");
        Ok(())
    }

    pub async fn list_serials(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.registry.list_serials().await?)
    }

    pub async fn page(
        &self,
        page: usize,
        limit: usize,
        query: Option<&str>,
    ) -> Result<RecordPage, ServiceError> {
        Ok(self.registry.page(page, limit, query).await?)
    }

    pub async fn stats(&self) -> Result<RegistryStats, ServiceError> {
        Ok(self.registry.stats().await?)
    }

    /// Delete every record. Requires the exact confirmation phrase and no
    /// writes in flight.
    pub async fn wipe(&self, confirmation: Option<&str>) -> Result<(), ServiceError> {
        if confirmation.map(str::trim) != Some(WIPE_CONFIRMATION) {
            tracing::warn!("wipe rejected: missing or incorrect confirmation");
            return Err(ServiceError::ConfirmationRequired(format!(
                "send the confirmation phrase {WIPE_CONFIRMATION}"
            )));
        }
        let _guard = self.gate.exclusive()?;

        if let Err(e) = self.registry.wipe().await {
            tracing::error!(error = %e, "registry wipe failed, reconnecting");
            if let Err(reconnect_err) = self.registry.reconnect().await {
                tracing::error!(error = %reconnect_err, "reconnect after failed wipe failed");
            }
            return Err(e.into());
        }
        tracing::warn!(backend = ?self.registry.kind(), "registry wiped");
        Ok(())
    }
}
