//! # Bonded Printer Storage
//!
//! The last printer a connection succeeded with is remembered so the next
//! process start can reconnect without a scan. At most one record exists.
//!
//! A record that cannot be parsed is treated as absent and deleted; it never
//! blocks start-up.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::WarraqError;
use crate::transport::PrinterDevice;

/// File name of the bonded record inside the state directory
pub const BOND_FILE: &str = "saved_bluetooth_printer.json";

/// Environment variable overriding the state directory
pub const STATE_DIR_ENV: &str = "WARRAQ_STATE_DIR";

/// The persisted identity of the bonded printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondedDeviceRecord {
    pub address: String,
    pub name: Option<String>,
}

impl BondedDeviceRecord {
    /// Rebuild a device to connect to.
    pub fn to_device(&self) -> PrinterDevice {
        PrinterDevice::new(self.address.clone(), self.name.clone())
    }
}

impl From<&PrinterDevice> for BondedDeviceRecord {
    fn from(device: &PrinterDevice) -> Self {
        Self {
            address: device.address.clone(),
            name: device.name.clone(),
        }
    }
}

/// Where the bonded record lives.
pub trait BondStore: Send + Sync {
    /// `Ok(None)` when nothing is stored; `Err` when the record is corrupt
    /// or unreadable.
    fn load(&self) -> Result<Option<BondedDeviceRecord>, WarraqError>;

    fn save(&self, record: &BondedDeviceRecord) -> Result<(), WarraqError>;

    fn clear(&self) -> Result<(), WarraqError>;
}

fn parse(text: &str) -> Result<BondedDeviceRecord, WarraqError> {
    serde_json::from_str(text)
        .map_err(|e| WarraqError::BondStore(format!("corrupt bonded printer record: {}", e)))
}

/// Default state directory: `$WARRAQ_STATE_DIR`, else the platform data dir.
pub fn default_state_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("com", "warraq", "warraq")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".warraq"))
}

// ============================================================================
// FILE STORE
// ============================================================================

/// JSON file store.
pub struct FileBondStore {
    path: PathBuf,
}

impl FileBondStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store [`BOND_FILE`] inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(BOND_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BondStore for FileBondStore {
    fn load(&self) -> Result<Option<BondedDeviceRecord>, WarraqError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => parse(&text).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &BondedDeviceRecord) -> Result<(), WarraqError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // write-then-rename so a crash never leaves half a record
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), WarraqError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-memory store holding the serialized record.
#[derive(Default)]
pub struct MemoryBondStore {
    raw: Mutex<Option<String>>,
}

impl MemoryBondStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with arbitrary stored text, e.g. a corrupt record.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    fn raw(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.raw.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl BondStore for MemoryBondStore {
    fn load(&self) -> Result<Option<BondedDeviceRecord>, WarraqError> {
        self.raw().as_deref().map(parse).transpose()
    }

    fn save(&self, record: &BondedDeviceRecord) -> Result<(), WarraqError> {
        *self.raw() = Some(serde_json::to_string(record)?);
        Ok(())
    }

    fn clear(&self) -> Result<(), WarraqError> {
        *self.raw() = None;
        Ok(())
    }
}
