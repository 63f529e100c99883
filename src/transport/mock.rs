//! # Simulated Printer Backend
//!
//! An in-memory [`BleBackend`] that behaves like an ISSC-service thermal
//! printer. Used by `--simulate` and by the test suite.
//!
//! Failures are injected through setters on a shared [`SimulatedBackend`]
//! so a test can keep a handle to it after giving the backend away:
//!
//! ```
//! use std::sync::Arc;
//! use warraq::transport::{Backend, mock::SimulatedBackend};
//!
//! let sim = Arc::new(SimulatedBackend::new());
//! let backend: Backend = sim.clone();
//! sim.fail_next_discoveries(1);
//! # let _ = backend;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use super::gatt::{ISSC_SERVICE, ISSC_WRITE_PRIMARY, ISSC_WRITE_SECONDARY};
use super::{
    AdapterState, BleBackend, BleLink, CharacteristicDescriptor, PrinterDevice, ScanStream,
    ServiceDescriptor, WriteTarget,
};
use crate::error::WarraqError;

/// Devices advertised by a fresh simulator
pub const SIMULATED_DEVICES: &[(&str, &str)] = &[
    ("00:11:22:33:44:55", "Mock Thermal Printer 1"),
    ("AA:BB:CC:DD:EE:FF", "Mock Thermal Printer 2"),
    ("12:34:56:78:90:AB", "Mock POS Printer"),
];

/// Services of the simulated printer: the ISSC service with both write
/// characteristics.
pub fn issc_services() -> Vec<ServiceDescriptor> {
    vec![ServiceDescriptor {
        uuid: ISSC_SERVICE,
        characteristics: vec![
            CharacteristicDescriptor {
                uuid: ISSC_WRITE_PRIMARY,
                write_with_response: false,
                write_without_response: true,
            },
            CharacteristicDescriptor {
                uuid: ISSC_WRITE_SECONDARY,
                write_with_response: true,
                write_without_response: false,
            },
        ],
    }]
}

struct SimState {
    adapter: AdapterState,
    devices: Vec<PrinterDevice>,
    services: Vec<ServiceDescriptor>,
    connect_delay: Duration,
    refuse_connects: bool,
    discovery_failures: usize,
    max_write_len: Option<usize>,
    fail_writes: bool,
    fail_write_after: Option<usize>,
    writes: Vec<(WriteTarget, Vec<u8>)>,
    connects: usize,
    hold_scans_open: bool,
    scanning: bool,
    current_link: Option<Arc<AtomicBool>>,
}

/// Simulated adapter with a configurable set of printers.
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    /// A powered-on adapter seeing [`SIMULATED_DEVICES`].
    pub fn new() -> Self {
        let devices = SIMULATED_DEVICES
            .iter()
            .map(|(address, name)| PrinterDevice::new(*address, Some(name.to_string())))
            .collect();
        Self {
            state: Arc::new(Mutex::new(SimState {
                adapter: AdapterState::PoweredOn,
                devices,
                services: issc_services(),
                connect_delay: Duration::ZERO,
                refuse_connects: false,
                discovery_failures: 0,
                max_write_len: None,
                fail_writes: false,
                fail_write_after: None,
                writes: Vec::new(),
                connects: 0,
                hold_scans_open: false,
                scanning: false,
                current_link: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    // ===== Fault injection =====

    pub fn set_adapter_state(&self, adapter: AdapterState) {
        self.state().adapter = adapter;
    }

    pub fn set_services(&self, services: Vec<ServiceDescriptor>) {
        self.state().services = services;
    }

    /// Delay every link establishment (to exercise connect timeouts).
    pub fn set_connect_delay(&self, delay: Duration) {
        self.state().connect_delay = delay;
    }

    pub fn refuse_connects(&self, refuse: bool) {
        self.state().refuse_connects = refuse;
    }

    /// The next `n` service enumerations fail with a discovery error.
    pub fn fail_next_discoveries(&self, n: usize) {
        self.state().discovery_failures = n;
    }

    /// Reject writes longer than `len` bytes, like a small ATT MTU.
    pub fn set_max_write_len(&self, len: Option<usize>) {
        self.state().max_write_len = len;
    }

    pub fn fail_all_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// After `n` more successful writes, fail exactly one.
    pub fn fail_one_write_after(&self, n: usize) {
        self.state().fail_write_after = Some(n);
    }

    /// Keep scan streams open after the last advertisement, like a real
    /// adapter, so a scan only ends at its window or when cancelled.
    pub fn hold_scans_open(&self, hold: bool) {
        self.state().hold_scans_open = hold;
    }

    /// Drop the current link as if the printer went out of range.
    pub fn drop_link(&self) {
        if let Some(flag) = self.state().current_link.take() {
            flag.store(false, Ordering::SeqCst);
        }
    }

    // ===== Observation =====

    /// Every accepted write payload, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.iter().map(|(_, data)| data.clone()).collect()
    }

    /// Every accepted write with the characteristic and mode it went to.
    pub fn targeted_writes(&self) -> Vec<(WriteTarget, Vec<u8>)> {
        self.state().writes.clone()
    }

    /// All accepted bytes, concatenated.
    pub fn received(&self) -> Vec<u8> {
        self.writes().concat()
    }

    /// True between `start_scan` and `stop_scan`.
    pub fn is_scanning(&self) -> bool {
        self.state().scanning
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    /// Number of links established so far.
    pub fn connect_count(&self) -> usize {
        self.state().connects
    }
}

#[async_trait]
impl BleBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn adapter_state(&self) -> Result<AdapterState, WarraqError> {
        Ok(self.state().adapter)
    }

    async fn start_scan(&self) -> Result<ScanStream, WarraqError> {
        // Every device is observed twice, as advertisements repeat.
        let (observations, hold): (Vec<PrinterDevice>, bool) = {
            let mut state = self.state();
            state.scanning = true;
            let observations = state
                .devices
                .iter()
                .chain(state.devices.iter())
                .map(|d| PrinterDevice::new(d.address.clone(), d.name.clone()))
                .collect();
            (observations, state.hold_scans_open)
        };
        let stream = futures::stream::iter(observations);
        if hold {
            Ok(stream.chain(futures::stream::pending()).boxed())
        } else {
            Ok(stream.boxed())
        }
    }

    async fn stop_scan(&self) -> Result<(), WarraqError> {
        self.state().scanning = false;
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<Arc<dyn BleLink>, WarraqError> {
        let delay = self.state().connect_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.refuse_connects {
            return Err(WarraqError::Connection(
                "simulated printer refused the connection".into(),
            ));
        }
        if !state.devices.iter().any(|d| d.address == address) {
            return Err(WarraqError::Connection(format!("printer {} not found", address)));
        }

        let connected = Arc::new(AtomicBool::new(true));
        if let Some(previous) = state.current_link.replace(connected.clone()) {
            previous.store(false, Ordering::SeqCst);
        }
        state.connects += 1;

        Ok(Arc::new(SimulatedLink {
            address: address.to_string(),
            connected,
            state: self.state.clone(),
        }))
    }
}

/// A link to the simulated printer.
pub struct SimulatedLink {
    address: String,
    connected: Arc<AtomicBool>,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedLink {
    fn up(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BleLink for SimulatedLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn is_connected(&self) -> bool {
        self.up()
    }

    async fn discover_services(&self) -> Result<(), WarraqError> {
        if !self.up() {
            return Err(WarraqError::Discovery("link is not connected".into()));
        }
        Ok(())
    }

    async fn services(&self) -> Result<Vec<ServiceDescriptor>, WarraqError> {
        if !self.up() {
            return Err(WarraqError::Discovery("link is not connected".into()));
        }
        let mut state = lock(&self.state);
        if state.discovery_failures > 0 {
            state.discovery_failures -= 1;
            return Err(WarraqError::Discovery("simulated discovery failure".into()));
        }
        Ok(state.services.clone())
    }

    async fn write(&self, target: &WriteTarget, data: &[u8]) -> Result<(), WarraqError> {
        if !self.up() {
            return Err(WarraqError::NotConnected);
        }
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(WarraqError::Write("simulated write failure".into()));
        }
        match state.fail_write_after {
            Some(0) => {
                state.fail_write_after = None;
                return Err(WarraqError::Write("simulated write failure".into()));
            }
            Some(n) => state.fail_write_after = Some(n - 1),
            None => {}
        }
        if let Some(max) = state.max_write_len
            && data.len() > max
        {
            return Err(WarraqError::Write(format!(
                "payload of {} bytes exceeds {} byte limit",
                data.len(),
                max
            )));
        }
        state.writes.push((*target, data.to_vec()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), WarraqError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
