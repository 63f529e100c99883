//! # Connection Manager
//!
//! Owns the single printer link of the process.
//!
//! ## State Machine
//!
//! ```text
//!            scan                connect
//!   Idle ───────────▶ Scanning   Idle/Disconnected ──▶ Connecting ──▶ Verifying ──▶ Connected
//!     ▲                  │                                  │              │            │
//!     └──────────────────┘                                  └──────┬───────┘            │ reconnect
//!                                                                  ▼                    ▼
//!                                                           Disconnected ◀───── Reconnecting
//! ```
//!
//! - Scanning is only published while no link exists; a scan during an
//!   active connection leaves the published state alone.
//! - Connecting, verifying, reconnecting and disconnecting are serialized:
//!   at most one link sequence runs at a time.
//! - A link counts as connected only after eager service discovery
//!   succeeded. Discovery failure tears the fresh link down again.
//! - On success the device becomes the bonded printer.
//!
//! State changes are published through a [`tokio::sync::watch`] channel.
//! Dropping the receiver returned by [`ConnectionManager::subscribe`]
//! unsubscribes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::time::{Duration, timeout};

use super::bond::{BondStore, BondedDeviceRecord};
use super::config::ConnectionConfig;
use super::transmit::Reconnect;
use crate::error::WarraqError;
use crate::transport::{Backend, BleLink, PrinterDevice, ScanGuard};

/// Published connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting,
    Verifying,
    Connected,
    Reconnecting,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::Verifying => "verifying",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// A live link to the bonded printer.
///
/// Cheap to clone. Replaced handles are invalidated so a stale clone is
/// never written through.
#[derive(Clone)]
pub struct ConnectionHandle {
    link: Arc<dyn BleLink>,
    device: PrinterDevice,
    valid: Arc<AtomicBool>,
}

impl ConnectionHandle {
    fn new(link: Arc<dyn BleLink>, device: PrinterDevice) -> Self {
        Self {
            link,
            device,
            valid: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn device(&self) -> &PrinterDevice {
        &self.device
    }

    pub fn link(&self) -> &dyn BleLink {
        self.link.as_ref()
    }

    /// False once the manager replaced or released this handle.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("device", &self.device)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// The process-wide owner of the printer link.
pub struct ConnectionManager {
    backend: Backend,
    store: Box<dyn BondStore>,
    config: ConnectionConfig,
    state: watch::Sender<ConnectionState>,
    current: Mutex<Option<ConnectionHandle>>,
    registry: Mutex<Vec<PrinterDevice>>,
    sequence: Mutex<()>,
}

impl ConnectionManager {
    pub fn new(backend: Backend, store: Box<dyn BondStore>, config: ConnectionConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            backend,
            store,
            config,
            state,
            current: Mutex::new(None),
            registry: Mutex::new(Vec::new()),
            sequence: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    // ===== State publication =====

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receive every state change. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = %prev, to = %next, "connection state changed");
        }
    }

    // ===== Scanning =====

    /// Collect nearby printers for the configured scan window.
    ///
    /// Devices are deduplicated by address; a later observation fills in a
    /// name the first one lacked. Returns early if the backend ends the
    /// scan stream. Each call returns what it saw itself; the registry
    /// behind [`ConnectionManager::devices`] holds the last completed scan.
    pub async fn scan(&self) -> Result<Vec<PrinterDevice>, WarraqError> {
        let mut stream = self.backend.start_scan().await?;
        let guard = ScanGuard::for_backend(self.backend.clone());

        let publish = matches!(
            self.state(),
            ConnectionState::Idle | ConnectionState::Disconnected
        );
        if publish {
            self.set_state(ConnectionState::Scanning);
        }
        let _published = publish.then(|| ScanningPublished(self));
        tracing::info!(window = ?self.config.scan_window(), "scanning for printers");

        let deadline = tokio::time::sleep(self.config.scan_window());
        tokio::pin!(deadline);

        let mut found = Vec::new();
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                next = stream.next() => match next {
                    Some(device) => observe(&mut found, device),
                    None => break,
                }
            }
        }

        guard.stop().await;
        *self.registry.lock().await = found.clone();
        tracing::info!(count = found.len(), "scan complete");
        Ok(found)
    }

    /// Devices collected by the last scan.
    pub async fn devices(&self) -> Vec<PrinterDevice> {
        self.registry.lock().await.clone()
    }

    /// Look up a scanned device by address.
    pub async fn find_device(&self, address: &str) -> Option<PrinterDevice> {
        self.registry
            .lock()
            .await
            .iter()
            .find(|d| d.address.eq_ignore_ascii_case(address))
            .cloned()
    }

    // ===== Link sequences =====

    /// Connect, verify the link with eager service discovery, and bond.
    ///
    /// An existing link to another (or the same) device is released first.
    pub async fn connect(&self, device: &PrinterDevice) -> Result<ConnectionHandle, WarraqError> {
        let _sequence = self.sequence.lock().await;

        let previous = self.current.lock().await.take();
        if let Some(old) = previous {
            tracing::debug!(address = %old.device.address, "releasing previous link");
            self.release(old).await;
        }

        tracing::info!(address = %device.address, name = ?device.name, "connecting");
        self.set_state(ConnectionState::Connecting);

        match self
            .establish(device, self.config.connect_timeout(), ConnectionState::Verifying)
            .await
        {
            Ok(handle) => Ok(self.adopt(handle).await),
            Err(e) => {
                tracing::error!(address = %device.address, error = %e, "connection failed");
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Tear down the current link and connect to the same device again.
    ///
    /// Without a current link the bonded printer is used.
    pub async fn reconnect(&self) -> Result<ConnectionHandle, WarraqError> {
        let _sequence = self.sequence.lock().await;

        let old = self.current.lock().await.take();
        let device = match &old {
            Some(handle) => handle.device.clone(),
            None => self
                .bonded_device()
                .map(|r| r.to_device())
                .ok_or(WarraqError::NotConnected)?,
        };

        tracing::info!(address = %device.address, "reconnecting");
        self.set_state(ConnectionState::Reconnecting);

        if let Some(old) = old {
            self.release(old).await;
        }
        tokio::time::sleep(self.config.reconnect_delay()).await;

        match self
            .establish(&device, self.config.reconnect_timeout(), ConnectionState::Reconnecting)
            .await
        {
            Ok(handle) => Ok(self.adopt(handle).await),
            Err(e) => {
                tracing::error!(address = %device.address, error = %e, "reconnect failed");
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Release the link. The bonded record is kept.
    pub async fn disconnect(&self) -> Result<(), WarraqError> {
        let _sequence = self.sequence.lock().await;

        let old = self.current.lock().await.take();
        let result = match old {
            Some(handle) => {
                handle.invalidate();
                tracing::info!(address = %handle.device.address, "disconnecting");
                handle.link.disconnect().await
            }
            None => Ok(()),
        };
        self.set_state(ConnectionState::Idle);
        result
    }

    /// Connected, with a valid handle whose link is still up.
    pub async fn is_connected(&self) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }
        let handle = self.current.lock().await.clone();
        match handle {
            Some(h) => h.is_valid() && h.link.is_connected().await,
            None => false,
        }
    }

    /// The current handle, if a link exists.
    pub async fn current(&self) -> Option<ConnectionHandle> {
        self.current.lock().await.clone()
    }

    async fn establish(
        &self,
        device: &PrinterDevice,
        connect_timeout: Duration,
        verifying: ConnectionState,
    ) -> Result<ConnectionHandle, WarraqError> {
        let link = timeout(connect_timeout, self.backend.connect(&device.address))
            .await
            .map_err(|_| WarraqError::Timeout(connect_timeout, "connecting"))??;

        self.set_state(verifying);
        let discovery_timeout = self.config.discovery_timeout();
        let discovered = match timeout(discovery_timeout, link.discover_services()).await {
            Ok(result) => result,
            Err(_) => Err(WarraqError::Timeout(discovery_timeout, "discovering services")),
        };

        if let Err(e) = discovered {
            if let Err(close) = link.disconnect().await {
                tracing::warn!(error = %close, "failed to close unverified link");
            }
            return Err(e);
        }

        Ok(ConnectionHandle::new(link, device.clone()))
    }

    async fn adopt(&self, handle: ConnectionHandle) -> ConnectionHandle {
        *self.current.lock().await = Some(handle.clone());
        self.set_state(ConnectionState::Connected);
        tracing::info!(address = %handle.device.address, "printer connected");

        if let Err(e) = self.store.save(&BondedDeviceRecord::from(&handle.device)) {
            tracing::warn!(error = %e, "failed to persist bonded printer");
        }
        handle
    }

    async fn release(&self, handle: ConnectionHandle) {
        handle.invalidate();
        if let Err(e) = handle.link.disconnect().await {
            tracing::warn!(error = %e, "failed to cancel link");
        }
    }

    // ===== Bonding =====

    /// The bonded printer, if a readable record exists.
    ///
    /// A corrupt record is deleted and reported as absent.
    pub fn bonded_device(&self) -> Option<BondedDeviceRecord> {
        match self.store.load() {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable bonded printer record");
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "failed to delete bonded printer record");
                }
                None
            }
        }
    }

    pub fn forget_bonded_device(&self) -> Result<(), WarraqError> {
        self.store.clear()?;
        tracing::info!("forgot bonded printer");
        Ok(())
    }

    /// Reconnect to the bonded printer at start-up.
    ///
    /// `Ok(None)` when there is nothing to restore.
    pub async fn restore(&self) -> Result<Option<ConnectionHandle>, WarraqError> {
        let Some(record) = self.bonded_device() else {
            return Ok(None);
        };
        tracing::info!(address = %record.address, "restoring bonded printer");
        self.connect(&record.to_device()).await.map(Some)
    }
}

/// Leaves `Scanning` for `Idle` when the scan ends, cancelled or not,
/// unless something else changed the state meanwhile.
struct ScanningPublished<'a>(&'a ConnectionManager);

impl Drop for ScanningPublished<'_> {
    fn drop(&mut self) {
        if self.0.state() == ConnectionState::Scanning {
            self.0.set_state(ConnectionState::Idle);
        }
    }
}

fn observe(found: &mut Vec<PrinterDevice>, device: PrinterDevice) {
    match found.iter_mut().find(|d| d.address == device.address) {
        Some(known) => {
            if known.name.is_none() && device.name.is_some() {
                known.name = device.name;
            }
        }
        None => {
            tracing::debug!(address = %device.address, name = ?device.name, "found printer");
            found.push(device);
        }
    }
}

#[async_trait]
impl Reconnect for ConnectionManager {
    async fn reconnect(&self) -> Result<ConnectionHandle, WarraqError> {
        ConnectionManager::reconnect(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::bond::MemoryBondStore;
    use crate::transport::mock::SimulatedBackend;
    use crate::transport::AdapterState;

    fn fast_config() -> ConnectionConfig {
        ConnectionConfig {
            scan_window_ms: 200,
            connect_timeout_ms: 200,
            discovery_timeout_ms: 200,
            reconnect_timeout_ms: 200,
            reconnect_delay_ms: 1,
        }
    }

    fn manager() -> (Arc<SimulatedBackend>, ConnectionManager) {
        let sim = Arc::new(SimulatedBackend::new());
        let backend: Backend = sim.clone();
        let manager = ConnectionManager::new(backend, Box::new(MemoryBondStore::new()), fast_config());
        (sim, manager)
    }

    fn printer() -> PrinterDevice {
        PrinterDevice::new("00:11:22:33:44:55", Some("Mock Thermal Printer 1".into()))
    }

    #[tokio::test]
    async fn test_scan_dedups_repeated_observations() {
        let (_sim, manager) = manager();
        let found = manager.scan().await.unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert!(manager.find_device("aa:bb:cc:dd:ee:ff").await.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_scan_stops_adapter_and_resets_state() {
        let (sim, manager) = manager();
        sim.hold_scans_open(true);

        let cancelled = timeout(Duration::from_millis(50), manager.scan()).await;
        assert!(cancelled.is_err());
        assert_eq!(manager.state(), ConnectionState::Idle);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sim.is_scanning());
    }

    #[tokio::test]
    async fn test_overlapping_scans_each_return_their_devices() {
        let (sim, manager) = manager();
        sim.hold_scans_open(true);

        let late = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            manager.scan().await
        };
        let (first, second) = tokio::join!(manager.scan(), late);

        assert_eq!(first.unwrap().len(), 3);
        assert_eq!(second.unwrap().len(), 3);
        assert_eq!(manager.devices().await.len(), 3);
        assert!(!sim.is_scanning());
        assert_eq!(manager.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_scan_keeps_connected_state() {
        let (_sim, manager) = manager();
        manager.connect(&printer()).await.unwrap();
        let mut rx = manager.subscribe();
        manager.scan().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_connect_bonds_device() {
        let (_sim, manager) = manager();
        let handle = manager.connect(&printer()).await.unwrap();
        assert!(handle.is_valid());
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.is_connected().await);
        assert_eq!(
            manager.bonded_device(),
            Some(BondedDeviceRecord::from(&printer()))
        );
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let (sim, manager) = manager();
        sim.set_connect_delay(Duration::from_secs(5));
        let err = manager.connect(&printer()).await.unwrap_err();
        assert!(matches!(err, WarraqError::Timeout(_, "connecting")));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.bonded_device(), None);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let (sim, manager) = manager();
        sim.refuse_connects(true);
        assert!(manager.connect(&printer()).await.is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.current().await.is_none());
    }

    #[tokio::test]
    async fn test_new_connection_invalidates_old_handle() {
        let (_sim, manager) = manager();
        let first = manager.connect(&printer()).await.unwrap();
        let other = PrinterDevice::new("AA:BB:CC:DD:EE:FF", None);
        let second = manager.connect(&other).await.unwrap();
        assert!(!first.is_valid());
        assert!(!first.link().is_connected().await);
        assert!(second.is_valid());
        assert_eq!(manager.bonded_device().unwrap().address, "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test]
    async fn test_concurrent_connects_run_one_at_a_time() {
        let (sim, manager) = manager();
        sim.set_connect_delay(Duration::from_millis(50));
        let other = PrinterDevice::new("AA:BB:CC:DD:EE:FF", None);

        let device = printer();
        let (first, second) = tokio::join!(manager.connect(&device), manager.connect(&other));
        let (first, second) = (first.unwrap(), second.unwrap());

        // the second sequence waited for the first, then replaced its link
        assert!(!first.is_valid());
        assert!(!first.link().is_connected().await);
        assert!(second.is_valid());
        assert_eq!(sim.connect_count(), 2);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.current().await.unwrap().device().address, other.address);
        assert_eq!(manager.bonded_device().unwrap().address, "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test]
    async fn test_reconnect_waits_for_running_connect() {
        let (sim, manager) = manager();
        sim.set_connect_delay(Duration::from_millis(50));

        let device = printer();
        let (connected, reconnected) = tokio::join!(manager.connect(&device), manager.reconnect());
        let (connected, reconnected) = (connected.unwrap(), reconnected.unwrap());

        // reconnect saw the link made by connect and replaced it
        assert!(!connected.is_valid());
        assert!(reconnected.is_valid());
        assert_eq!(reconnected.device().address, "00:11:22:33:44:55");
        assert_eq!(sim.connect_count(), 2);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_reconnect_after_link_loss() {
        let (sim, manager) = manager();
        let old = manager.connect(&printer()).await.unwrap();
        sim.drop_link();
        assert!(!manager.is_connected().await);

        let fresh = manager.reconnect().await.unwrap();
        assert!(!old.is_valid());
        assert!(fresh.is_valid());
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(sim.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_reconnect_ends_disconnected() {
        let (sim, manager) = manager();
        manager.connect(&printer()).await.unwrap();
        sim.refuse_connects(true);
        assert!(manager.reconnect().await.is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn test_reconnect_without_bond() {
        let (_sim, manager) = manager();
        assert!(matches!(
            manager.reconnect().await,
            Err(WarraqError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_keeps_bond() {
        let (_sim, manager) = manager();
        let handle = manager.connect(&printer()).await.unwrap();
        manager.disconnect().await.unwrap();
        assert!(!handle.is_valid());
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert!(manager.bonded_device().is_some());
    }

    #[tokio::test]
    async fn test_restore_from_bond() {
        let sim = Arc::new(SimulatedBackend::new());
        let store = MemoryBondStore::new();
        store.save(&BondedDeviceRecord::from(&printer())).unwrap();
        let manager = ConnectionManager::new(sim.clone(), Box::new(store), fast_config());

        let handle = manager.restore().await.unwrap().unwrap();
        assert_eq!(handle.device().address, "00:11:22:33:44:55");
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_corrupt_bond_is_discarded() {
        let sim = Arc::new(SimulatedBackend::new());
        let manager = ConnectionManager::new(
            sim,
            Box::new(MemoryBondStore::with_raw("{{{")),
            fast_config(),
        );
        assert!(manager.restore().await.unwrap().is_none());
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert!(manager.bonded_device().is_none());
    }

    #[tokio::test]
    async fn test_state_transitions_are_published() {
        let (_sim, manager) = manager();
        let mut rx = manager.subscribe();
        manager.connect(&printer()).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_adapter_state_passthrough() {
        let (sim, manager) = manager();
        sim.set_adapter_state(AdapterState::PoweredOff);
        assert_eq!(
            manager.backend().adapter_state().await.unwrap(),
            AdapterState::PoweredOff
        );
    }
}
