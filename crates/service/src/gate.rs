//! Exclusion between registry writers and a full wipe.

use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::ServiceError;

/// Shared gate: ingestion, import and manual adds hold a shared guard, a wipe
/// holds the exclusive one. Neither side waits; the loser gets
/// [`ServiceError::Busy`].
#[derive(Debug, Clone, Default)]
pub struct WipeGate {
    lock: Arc<RwLock<()>>,
}

impl WipeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> Result<OwnedRwLockReadGuard<()>, ServiceError> {
        Arc::clone(&self.lock)
            .try_read_owned()
            .map_err(|_| ServiceError::Busy("a registry wipe is in progress"))
    }

    pub fn exclusive(&self) -> Result<OwnedRwLockWriteGuard<()>, ServiceError> {
        Arc::clone(&self.lock)
            .try_write_owned()
            .map_err(|_| ServiceError::Busy("registry writes are in progress"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code")]

    use super::*;

    #[test]
    fn writers_share_and_wipe_excludes() {
        let gate = WipeGate::new();
        let a = gate.enter().unwrap();
        let b = gate.enter().unwrap();
        assert!(matches!(gate.exclusive(), Err(ServiceError::Busy(_))));
        drop(a);
        drop(b);

        let wipe = gate.exclusive().unwrap();
        assert!(matches!(gate.enter(), Err(ServiceError::Busy(_))));
        drop(wipe);
        assert!(gate.enter().is_ok());
    }
}
