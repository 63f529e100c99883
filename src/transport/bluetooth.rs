//! # Bluetooth Low Energy Transport
//!
//! btleplug-backed implementation of [`BleBackend`] and [`BleLink`].
//!
//! ## Device Identity
//!
//! Devices are identified by their link-layer address (`AA:BB:CC:DD:EE:FF`).
//! Some platforms (CoreBluetooth) hide the address and report all zeros; the
//! platform peripheral id is used instead. Either way the identity is stable
//! across scans, which is what the bonded record relies on.
//!
//! ## Connecting to a Bonded Printer
//!
//! The adapter only knows peripherals it has seen since start-up. When a
//! bonded printer is not in the adapter's cache, a short lookup scan runs
//! until the address shows up. The scan is stopped even when the caller
//! gives up on the connect (see [`ScanGuard`]).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, CharPropFlags, Characteristic, Manager as _,
    Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{FutureExt, StreamExt};

use super::{
    AdapterState, BleBackend, BleLink, CharacteristicDescriptor, PrinterDevice, ScanGuard,
    ScanStream, ServiceDescriptor, WriteMode, WriteTarget,
};
use crate::error::WarraqError;

/// How long a lookup scan may run when connecting to an uncached address.
///
/// Kept below the default reconnect timeout (5 s) so a missing printer is
/// reported as not found rather than as a timeout.
const LOOKUP_WINDOW: Duration = Duration::from_secs(4);

/// Map a btleplug error, keeping permission and timeout failures distinct.
fn map_err(err: btleplug::Error, context: &'static str, fallback: fn(String) -> WarraqError) -> WarraqError {
    match err {
        btleplug::Error::PermissionDenied => WarraqError::PermissionDenied(context.to_string()),
        btleplug::Error::NotConnected => WarraqError::NotConnected,
        btleplug::Error::TimedOut(d) => WarraqError::Timeout(d, context),
        other => fallback(format!("{}: {}", context, other)),
    }
}

/// Identity of a peripheral: address, or platform id when the address is hidden.
fn peripheral_key(peripheral: &Peripheral) -> String {
    let address = peripheral.address();
    if address.into_inner() == [0u8; 6] {
        peripheral.id().to_string()
    } else {
        address.to_string()
    }
}

async fn describe(peripheral: &Peripheral) -> Option<PrinterDevice> {
    let props = peripheral.properties().await.ok()??;
    Some(PrinterDevice::new(peripheral_key(peripheral), props.local_name))
}

// ============================================================================
// Backend
// ============================================================================

/// The first Bluetooth adapter of the host.
pub struct BluetoothBackend {
    adapter: Adapter,
}

impl BluetoothBackend {
    /// Initialize the platform BLE manager and take the first adapter.
    ///
    /// ## Errors
    ///
    /// [`WarraqError::Unavailable`] when there is no BLE stack or adapter,
    /// [`WarraqError::PermissionDenied`] when the platform refuses access.
    pub async fn new() -> Result<Self, WarraqError> {
        let manager = Manager::new()
            .await
            .map_err(|e| map_err(e, "initializing Bluetooth", WarraqError::Unavailable))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| map_err(e, "listing adapters", WarraqError::Unavailable))?
            .into_iter()
            .next()
            .ok_or_else(|| WarraqError::Unavailable("no Bluetooth adapter found".into()))?;

        Ok(Self { adapter })
    }

    async fn find_cached(&self, address: &str) -> Result<Option<Peripheral>, WarraqError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| map_err(e, "listing peripherals", WarraqError::Connection))?;
        Ok(peripherals.into_iter().find(|p| peripheral_key(p) == address))
    }

    async fn lookup(&self, address: &str) -> Result<Peripheral, WarraqError> {
        if let Some(p) = self.find_cached(address).await? {
            return Ok(p);
        }

        tracing::debug!(%address, "printer not cached, running lookup scan");
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| map_err(e, "subscribing to adapter events", WarraqError::Connection))?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| map_err(e, "scanning", WarraqError::Connection))?;
        let adapter = self.adapter.clone();
        let guard = ScanGuard::new(
            async move {
                if let Err(e) = adapter.stop_scan().await {
                    tracing::warn!(error = %e, "failed to stop lookup scan");
                }
            }
            .boxed(),
        );

        let deadline = tokio::time::sleep(LOOKUP_WINDOW);
        tokio::pin!(deadline);

        let mut found = None;
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => match event {
                    Some(CentralEvent::DeviceDiscovered(id)) | Some(CentralEvent::DeviceUpdated(id)) => {
                        if let Ok(p) = self.adapter.peripheral(&id).await
                            && peripheral_key(&p) == address
                        {
                            found = Some(p);
                            break;
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }

        guard.stop().await;
        found.ok_or_else(|| WarraqError::Connection(format!("printer {} not found", address)))
    }
}

#[async_trait]
impl BleBackend for BluetoothBackend {
    fn name(&self) -> &'static str {
        "bluetooth"
    }

    async fn adapter_state(&self) -> Result<AdapterState, WarraqError> {
        let state = self
            .adapter
            .adapter_state()
            .await
            .map_err(|e| map_err(e, "reading adapter state", WarraqError::Unavailable))?;
        Ok(match state {
            CentralState::PoweredOn => AdapterState::PoweredOn,
            CentralState::PoweredOff => AdapterState::PoweredOff,
            _ => AdapterState::Unknown,
        })
    }

    async fn start_scan(&self) -> Result<ScanStream, WarraqError> {
        let events = self
            .adapter
            .events()
            .await
            .map_err(|e| map_err(e, "subscribing to adapter events", WarraqError::Connection))?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| map_err(e, "scanning", WarraqError::Connection))?;

        let adapter = self.adapter.clone();
        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        let peripheral = adapter.peripheral(&id).await.ok()?;
                        describe(&peripheral).await
                    }
                    _ => None,
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn stop_scan(&self) -> Result<(), WarraqError> {
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| map_err(e, "stopping scan", WarraqError::Connection))
    }

    async fn connect(&self, address: &str) -> Result<Arc<dyn BleLink>, WarraqError> {
        let peripheral = self.lookup(address).await?;
        peripheral
            .connect()
            .await
            .map_err(|e| map_err(e, "connecting", WarraqError::Connection))?;
        tracing::debug!(%address, "link established");
        Ok(Arc::new(BluetoothLink {
            address: address.to_string(),
            peripheral,
        }))
    }
}

// ============================================================================
// Link
// ============================================================================

/// One connected peripheral.
pub struct BluetoothLink {
    address: String,
    peripheral: Peripheral,
}

impl BluetoothLink {
    fn characteristic(&self, target: &WriteTarget) -> Option<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == target.characteristic && c.service_uuid == target.service)
    }
}

#[async_trait]
impl BleLink for BluetoothLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn discover_services(&self) -> Result<(), WarraqError> {
        self.peripheral
            .discover_services()
            .await
            .map_err(|e| map_err(e, "discovering services", WarraqError::Discovery))
    }

    async fn services(&self) -> Result<Vec<ServiceDescriptor>, WarraqError> {
        if !self.is_connected().await {
            return Err(WarraqError::Discovery("link is not connected".into()));
        }

        let services: Vec<ServiceDescriptor> = self
            .peripheral
            .services()
            .into_iter()
            .map(|s| ServiceDescriptor {
                uuid: s.uuid,
                characteristics: s
                    .characteristics
                    .into_iter()
                    .map(|c| CharacteristicDescriptor {
                        uuid: c.uuid,
                        write_with_response: c.properties.contains(CharPropFlags::WRITE),
                        write_without_response: c
                            .properties
                            .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
                    })
                    .collect(),
            })
            .collect();

        if services.is_empty() {
            return Err(WarraqError::Discovery("no services discovered".into()));
        }
        Ok(services)
    }

    async fn write(&self, target: &WriteTarget, data: &[u8]) -> Result<(), WarraqError> {
        let characteristic = self.characteristic(target).ok_or_else(|| {
            WarraqError::Write(format!("characteristic {} is gone", target.characteristic))
        })?;
        let write_type = match target.mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        };
        self.peripheral
            .write(&characteristic, data, write_type)
            .await
            .map_err(|e| map_err(e, "writing", WarraqError::Write))
    }

    async fn disconnect(&self) -> Result<(), WarraqError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| map_err(e, "disconnecting", WarraqError::Connection))
    }
}
