//! # Warraq - Arabic Receipt Printing over Bluetooth LE
//!
//! Warraq prints Arabic (and Latin) receipts on generic ESC/POS thermal
//! printers reached over Bluetooth Low Energy. It provides:
//!
//! - **Text pipeline**: Unicode normalization and legacy Arabic code pages
//! - **Protocol implementation**: ESC/POS command builders
//! - **Transport**: btleplug-backed BLE links, plus a simulated printer
//! - **Connection management**: scan, connect, bond, reconnect
//!
//! ## Quick Start
//!
//! ```
//! use warraq::receipt::build_print_job;
//!
//! let job = build_print_job(
//!     &["RECEIPT".to_string()],
//!     &["Item A  $5.00".to_string()],
//!     &["THANK YOU".to_string()],
//!     0x16,
//! );
//! assert_eq!(&job.as_bytes()[..2], &[0x1B, 0x40]);
//! ```
//!
//! Sending it needs a [`printer::Printer`]; see [`printer::service`].
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | ESC/POS builders, normalization, code pages |
//! | [`receipt`] | Print job assembly and sample receipts |
//! | [`transport`] | BLE backends and transmission strategies |
//! | [`printer`] | Profiles, bonding, connection manager, printer service |
//! | [`error`] | Error types |

pub mod error;
pub mod printer;
pub mod protocol;
pub mod receipt;
pub mod transport;

// Re-exports for convenience
pub use error::{FailureKind, WarraqError};
pub use printer::{Printer, PrinterProfile, Settings};
pub use receipt::{PrintJob, ReceiptContent, build_print_job};
