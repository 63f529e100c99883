//! Backend used when the Bluetooth stack could not be initialized.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AdapterState, BleBackend, BleLink, ScanStream};
use crate::error::WarraqError;

/// Every operation fails with [`WarraqError::Unavailable`] and the probe's reason.
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> WarraqError {
        WarraqError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl BleBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn adapter_state(&self) -> Result<AdapterState, WarraqError> {
        Err(self.error())
    }

    async fn start_scan(&self) -> Result<ScanStream, WarraqError> {
        Err(self.error())
    }

    async fn stop_scan(&self) -> Result<(), WarraqError> {
        Err(self.error())
    }

    async fn connect(&self, _address: &str) -> Result<Arc<dyn BleLink>, WarraqError> {
        Err(self.error())
    }
}
