//! # Printer Transport Layer
//!
//! This module abstracts the Bluetooth Low Energy link to the printer.
//!
//! The rest of the crate only talks to two traits:
//!
//! - [`BleBackend`]: the adapter (state, scanning, opening links)
//! - [`BleLink`]: one open link (GATT discovery and writes)
//!
//! ## Available Backends
//!
//! - [`bluetooth`]: btleplug-backed, for real printers
//! - [`unavailable`]: returned when the BLE stack cannot be initialized
//! - [`mock`]: simulated printer for `--simulate` runs and tests
//!
//! The backend is chosen once by [`init_backend`]; nothing downstream checks
//! for Bluetooth support again.

pub mod bluetooth;
pub mod gatt;
pub mod mock;
pub mod strategy;
pub mod unavailable;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::WarraqError;

pub use gatt::{CharacteristicDescriptor, ServiceDescriptor, WriteMode, WriteTarget};
pub use strategy::Strategy;

/// Power/authorization state of the local Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
    Unauthorized,
    Unknown,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PoweredOn => "powered on",
            Self::PoweredOff => "powered off",
            Self::Unauthorized => "unauthorized",
            Self::Unknown => "in an unknown state",
        };
        f.write_str(s)
    }
}

/// A printer seen during a scan (or rebuilt from the bonded record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterDevice {
    /// Link-layer address; the identity used for dedup and bonding
    pub address: String,
    /// Advertised name, if any
    pub name: Option<String>,
    /// When this device was (last) observed
    pub discovered_at: DateTime<Utc>,
}

impl PrinterDevice {
    pub fn new(address: impl Into<String>, name: Option<String>) -> Self {
        Self {
            address: address.into(),
            name,
            discovered_at: Utc::now(),
        }
    }

    /// Name for display, falling back to the address.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Scan observations. Devices may repeat; the connection manager dedups.
pub type ScanStream = BoxStream<'static, PrinterDevice>;

/// Shared handle to the selected backend.
pub type Backend = Arc<dyn BleBackend>;

/// The local Bluetooth adapter.
#[async_trait]
pub trait BleBackend: Send + Sync {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Current adapter state.
    async fn adapter_state(&self) -> Result<AdapterState, WarraqError>;

    /// Start scanning and return the stream of observations.
    async fn start_scan(&self) -> Result<ScanStream, WarraqError>;

    /// Stop a scan started with [`BleBackend::start_scan`].
    async fn stop_scan(&self) -> Result<(), WarraqError>;

    /// Open a link to the device with the given address.
    ///
    /// Not bounded by a timeout here; the connection manager wraps it.
    async fn connect(&self, address: &str) -> Result<Arc<dyn BleLink>, WarraqError>;
}

/// One open link to a printer.
#[async_trait]
pub trait BleLink: Send + Sync {
    /// Address of the remote device.
    fn address(&self) -> &str;

    /// Whether the link layer still reports the connection as up.
    async fn is_connected(&self) -> bool;

    /// Run full GATT service/characteristic discovery.
    async fn discover_services(&self) -> Result<(), WarraqError>;

    /// Enumerate discovered services.
    ///
    /// Fails with [`WarraqError::Discovery`] when the link is down or
    /// discovery has not produced anything usable.
    async fn services(&self) -> Result<Vec<ServiceDescriptor>, WarraqError>;

    /// Write one payload to a characteristic.
    async fn write(&self, target: &WriteTarget, data: &[u8]) -> Result<(), WarraqError>;

    /// Cancel the link and release it.
    async fn disconnect(&self) -> Result<(), WarraqError>;
}

/// Stops a running scan when dropped.
///
/// A scan future can be cancelled at any await point (typically by an outer
/// `tokio::time::timeout`). The guard makes sure the adapter stops scanning
/// anyway: [`ScanGuard::stop`] on the normal path, a spawned task on drop.
pub struct ScanGuard {
    stop: Option<BoxFuture<'static, ()>>,
}

impl ScanGuard {
    pub fn new(stop: BoxFuture<'static, ()>) -> Self {
        Self { stop: Some(stop) }
    }

    /// Guard a scan running on `backend`.
    pub fn for_backend(backend: Backend) -> Self {
        Self::new(
            async move {
                if let Err(e) = backend.stop_scan().await {
                    tracing::warn!(error = %e, "failed to stop scan");
                }
            }
            .boxed(),
        )
    }

    /// Stop the scan now and wait for it.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            stop.await;
        }
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!("scan cancelled, stopping it in the background");
                runtime.spawn(stop);
            }
            Err(_) => tracing::warn!("scan cancelled outside a runtime, cannot stop it"),
        }
    }
}

/// Probe the platform Bluetooth stack once and pick a backend.
///
/// Falls back to [`unavailable::UnavailableBackend`] carrying the reason, so
/// callers always get a backend and see [`WarraqError::Unavailable`] from
/// every operation instead of checking support themselves.
pub async fn init_backend() -> Backend {
    match bluetooth::BluetoothBackend::new().await {
        Ok(backend) => {
            tracing::info!("Bluetooth backend initialized");
            Arc::new(backend)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Bluetooth unavailable, printing disabled");
            Arc::new(unavailable::UnavailableBackend::new(e.to_string()))
        }
    }
}
