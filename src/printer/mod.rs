//! # Printer Module
//!
//! Everything above the raw BLE transport: profiles and settings, the
//! bonded-printer record, the connection manager, the transmission engine,
//! and the [`Printer`] service that ties them together.
//!
//! ## Modules
//!
//! - [`config`]: Printer profiles, timeouts, transmission pacing
//! - [`bond`]: Bonded printer persistence
//! - [`manager`]: Connection state machine
//! - [`transmit`]: Characteristic election and strategy fallback
//! - [`service`]: Application-facing facade

pub mod bond;
pub mod config;
pub mod manager;
pub mod service;
pub mod transmit;

pub use bond::{BondStore, BondedDeviceRecord, FileBondStore, MemoryBondStore};
pub use config::{ConnectionConfig, PrinterProfile, Settings, TransmissionConfig};
pub use manager::{ConnectionHandle, ConnectionManager, ConnectionState};
pub use service::Printer;
pub use transmit::{Reconnect, Transmitter};
