//! # Printer Service
//!
//! The one object application code talks to. Wraps the connection manager,
//! the job builder and the transmission engine behind a small API:
//!
//! ```no_run
//! use warraq::printer::{FileBondStore, Printer, Settings};
//! use warraq::transport::init_backend;
//!
//! # async fn run() -> Result<(), warraq::WarraqError> {
//! let backend = init_backend().await;
//! let store = FileBondStore::in_dir(std::path::Path::new("/tmp/warraq"));
//! let printer = Printer::start(backend, Box::new(store), Settings::default()).await?;
//!
//! if !printer.is_connected().await {
//!     let devices = printer.scan().await?;
//!     printer.connect(&devices[0]).await?;
//! }
//! printer
//!     .print_receipt(&["RECEIPT".into()], &["Item A  $5.00".into()], &["THANK YOU".into()])
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::watch;

use super::bond::{BondStore, BondedDeviceRecord};
use super::config::{PrinterProfile, Settings};
use super::manager::{ConnectionHandle, ConnectionManager, ConnectionState};
use super::transmit::Transmitter;
use crate::error::WarraqError;
use crate::receipt::{self, JobBuilder, PrintJob, ReceiptContent};
use crate::transport::{AdapterState, Backend, PrinterDevice};

/// Bluetooth receipt printer.
pub struct Printer {
    manager: Arc<ConnectionManager>,
    transmitter: Transmitter,
    profile: PrinterProfile,
}

impl Printer {
    /// Build the service without touching the radio.
    pub fn new(
        backend: Backend,
        store: Box<dyn BondStore>,
        settings: Settings,
    ) -> Result<Self, WarraqError> {
        settings.validate()?;
        tracing::debug!(backend = backend.name(), profile = %settings.profile.name, "printer service created");
        Ok(Self {
            manager: Arc::new(ConnectionManager::new(backend, store, settings.connection)),
            transmitter: Transmitter::new(&settings.profile, &settings.transmission),
            profile: settings.profile,
        })
    }

    /// Build the service and reconnect to the bonded printer, if any.
    ///
    /// A failed restore is logged, not returned: the service stays usable
    /// and the user can scan and connect again.
    pub async fn start(
        backend: Backend,
        store: Box<dyn BondStore>,
        settings: Settings,
    ) -> Result<Self, WarraqError> {
        let printer = Self::new(backend, store, settings)?;
        if printer.manager.bonded_device().is_some() {
            match printer.ensure_ready().await {
                Ok(()) => {
                    if let Err(e) = printer.manager.restore().await {
                        tracing::warn!(error = %e, "could not reconnect to bonded printer");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "skipping reconnect to bonded printer"),
            }
        }
        Ok(printer)
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn profile(&self) -> &PrinterProfile {
        &self.profile
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Receive connection state changes. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.manager.subscribe()
    }

    /// Check that the adapter can be used right now.
    ///
    /// Unknown states are let through; the subsequent operation reports the
    /// real failure.
    pub async fn ensure_ready(&self) -> Result<(), WarraqError> {
        match self.manager.backend().adapter_state().await? {
            AdapterState::PoweredOn | AdapterState::Unknown => Ok(()),
            state => Err(WarraqError::Adapter(state)),
        }
    }

    // ===== Connection =====

    pub async fn scan(&self) -> Result<Vec<PrinterDevice>, WarraqError> {
        self.ensure_ready().await?;
        self.manager.scan().await
    }

    pub async fn connect(&self, device: &PrinterDevice) -> Result<ConnectionHandle, WarraqError> {
        self.ensure_ready().await?;
        self.manager.connect(device).await
    }

    /// Connect by address, using the scanned name when known.
    pub async fn connect_address(&self, address: &str) -> Result<ConnectionHandle, WarraqError> {
        let device = self
            .manager
            .find_device(address)
            .await
            .unwrap_or_else(|| PrinterDevice::new(address, None));
        self.connect(&device).await
    }

    pub async fn reconnect(&self) -> Result<ConnectionHandle, WarraqError> {
        self.ensure_ready().await?;
        self.manager.reconnect().await
    }

    pub async fn disconnect(&self) -> Result<(), WarraqError> {
        self.manager.disconnect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.manager.is_connected().await
    }

    pub fn bonded_device(&self) -> Option<BondedDeviceRecord> {
        self.manager.bonded_device()
    }

    pub fn forget_bonded_device(&self) -> Result<(), WarraqError> {
        self.manager.forget_bonded_device()
    }

    // ===== Printing =====

    /// Build a receipt job with the profile's code page and send it.
    pub async fn print_receipt(
        &self,
        header: &[String],
        body: &[String],
        footer: &[String],
    ) -> Result<(), WarraqError> {
        let content = ReceiptContent {
            header: header.to_vec(),
            body: body.to_vec(),
            footer: footer.to_vec(),
        };
        self.print_content(&content).await
    }

    pub async fn print_content(&self, content: &ReceiptContent) -> Result<(), WarraqError> {
        let job = JobBuilder::from_profile(&self.profile).build(content);
        self.print_job(job).await
    }

    /// Send a finished job over the current link.
    pub async fn print_job(&self, job: PrintJob) -> Result<(), WarraqError> {
        let handle = self.manager.current().await.ok_or(WarraqError::NotConnected)?;
        self.transmitter
            .transmit(job, &handle, self.manager.as_ref())
            .await
    }

    /// A sample receipt laid out for this printer's line width.
    pub fn sample(&self, name: &str) -> Option<ReceiptContent> {
        receipt::by_name_with_width(name, self.profile.columns)
    }

    pub async fn print_test_page(&self) -> Result<(), WarraqError> {
        self.print_job(receipt::test_page()).await
    }

    pub async fn print_code_page_diagnostics(&self, pages: &[u8]) -> Result<(), WarraqError> {
        self.print_job(receipt::code_page_diagnostics(pages)).await
    }
}
