//! # Printer Configuration
//!
//! Printer profiles (what the hardware speaks) and the tuning knobs of the
//! connection manager and transmission engine.
//!
//! ## Built-in Profiles
//!
//! | Key    | Service      | Write characteristics (priority) | Code page |
//! |--------|--------------|----------------------------------|-----------|
//! | `issc` | `49535343-fe7d-…` | `…-1e4d-…`, `…-8841-…`      | 0x16 (Windows-1256) |
//! | `18f0` | `000018f0-…` | `00002af1-…`                     | 0x16 (Windows-1256) |
//!
//! ## Settings File
//!
//! All sections are optional; anything missing takes the default.
//!
//! ```json
//! {
//!   "profile": { "name": "Shop printer", "code_page": 22 },
//!   "connection": { "connect_timeout_ms": 8000 },
//!   "transmission": { "chunk_size": 20, "chunk_delay_ms": 10 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WarraqError;
use crate::protocol::codepage::CodePage;
use crate::protocol::commands::{CHARSET_ARABIC, DEFAULT_ARABIC_CODE_PAGE};
use crate::receipt::DEFAULT_COLUMNS;
use crate::transport::Strategy;
use crate::transport::gatt::{ISSC_SERVICE, ISSC_WRITE_PRIMARY, ISSC_WRITE_SECONDARY};

/// Service used by printers built around the 0x18F0 serial bridge
pub const SERIAL_18F0_SERVICE: Uuid = Uuid::from_u128(0x000018f0_0000_1000_8000_00805f9b34fb);

/// Write characteristic of the 0x18F0 service
pub const SERIAL_18F0_WRITE: Uuid = Uuid::from_u128(0x00002af1_0000_1000_8000_00805f9b34fb);

// ============================================================================
// PRINTER PROFILE
// ============================================================================

/// What a printer model expects on the wire.
///
/// ## Fields
///
/// - **service_uuid**: vendor GATT service holding the write characteristic
/// - **write_characteristics**: candidates, in election priority order
/// - **code_page**: value sent with `ESC t n` / `GS t n`
/// - **charset**: value sent with `ESC R n`
/// - **encoding**: table used to turn text into bytes for that code page
/// - **columns**: characters per line in the default font
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterProfile {
    pub name: String,
    pub service_uuid: Uuid,
    pub write_characteristics: Vec<Uuid>,
    pub code_page: u8,
    pub charset: u8,
    pub encoding: CodePage,
    pub columns: usize,
}

impl Default for PrinterProfile {
    fn default() -> Self {
        Self::issc()
    }
}

impl PrinterProfile {
    /// Generic 58mm BLE printer on the ISSC transparent-UART service.
    pub fn issc() -> Self {
        Self {
            name: "Generic BLE (ISSC)".to_string(),
            service_uuid: ISSC_SERVICE,
            write_characteristics: vec![ISSC_WRITE_PRIMARY, ISSC_WRITE_SECONDARY],
            code_page: DEFAULT_ARABIC_CODE_PAGE,
            charset: CHARSET_ARABIC,
            encoding: CodePage::Windows1256,
            columns: DEFAULT_COLUMNS,
        }
    }

    /// Generic 58mm BLE printer on the 0x18F0 service.
    pub fn serial_18f0() -> Self {
        Self {
            name: "Generic BLE (18F0)".to_string(),
            service_uuid: SERIAL_18F0_SERVICE,
            write_characteristics: vec![SERIAL_18F0_WRITE],
            ..Self::issc()
        }
    }

    /// Parse a profile string (CLI args or display name).
    ///
    /// Formats:
    /// - `"issc"`, `"18f0"` → built-in profile
    /// - Any built-in profile's display name (e.g. `"Generic BLE (ISSC)"`)
    pub fn parse(s: &str) -> Result<Self, String> {
        if let Some(profile) = Self::built_in().into_iter().find(|p| p.name == s) {
            return Ok(profile);
        }

        match s.to_lowercase().as_str() {
            "issc" => Ok(Self::issc()),
            "18f0" => Ok(Self::serial_18f0()),
            _ => Err(format!(
                "Unknown profile '{}'. Use 'issc', '18f0', or a profile JSON file",
                s
            )),
        }
    }

    /// List all built-in profiles.
    pub fn built_in() -> Vec<Self> {
        vec![Self::issc(), Self::serial_18f0()]
    }

    /// Load a profile from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, WarraqError> {
        let text = std::fs::read_to_string(path)?;
        let profile: Self = serde_json::from_str(&text)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), WarraqError> {
        if self.write_characteristics.is_empty() {
            return Err(WarraqError::Profile(format!(
                "profile '{}' lists no write characteristics",
                self.name
            )));
        }
        if self.columns == 0 {
            return Err(WarraqError::Profile(format!(
                "profile '{}' has zero columns",
                self.name
            )));
        }
        Ok(())
    }
}

// ============================================================================
// CONNECTION AND TRANSMISSION TUNING
// ============================================================================

/// Timeouts of the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// How long a scan collects devices
    pub scan_window_ms: u64,
    /// Bound on link establishment
    pub connect_timeout_ms: u64,
    /// Bound on eager service discovery after connecting
    pub discovery_timeout_ms: u64,
    /// Bound on link establishment during a reconnect
    pub reconnect_timeout_ms: u64,
    /// Pause between cancelling the old link and reconnecting
    pub reconnect_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            scan_window_ms: 10_000,
            connect_timeout_ms: 10_000,
            discovery_timeout_ms: 5_000,
            reconnect_timeout_ms: 5_000,
            reconnect_delay_ms: 300,
        }
    }
}

impl ConnectionConfig {
    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Pacing of the transmission strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionConfig {
    /// Pause after each single-byte write
    pub byte_delay_ms: u64,
    /// Payload size of the chunked fallback
    pub chunk_size: usize,
    /// Pause after each chunk
    pub chunk_delay_ms: u64,
    /// Bound on any single GATT write
    pub write_timeout_ms: u64,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            byte_delay_ms: 5,
            chunk_size: 5,
            chunk_delay_ms: 20,
            write_timeout_ms: 2_000,
        }
    }
}

impl TransmissionConfig {
    /// Strategies in the order they are tried.
    pub fn strategies(&self) -> Vec<Strategy> {
        vec![
            Strategy::ByteByByte {
                delay_ms: self.byte_delay_ms,
            },
            Strategy::Chunked {
                size: self.chunk_size,
                delay_ms: self.chunk_delay_ms,
            },
        ]
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Everything configurable, as loaded from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profile: PrinterProfile,
    pub connection: ConnectionConfig,
    pub transmission: TransmissionConfig,
}

impl Settings {
    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, WarraqError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, WarraqError> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), profile = %settings.profile.name, "loaded settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), WarraqError> {
        self.profile.validate()?;
        if self.transmission.chunk_size == 0 {
            return Err(WarraqError::Profile("chunk_size must be at least 1".into()));
        }
        if self.transmission.write_timeout_ms == 0 {
            return Err(WarraqError::Profile("write_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_profile_is_issc() {
        let profile = PrinterProfile::default();
        assert_eq!(profile.service_uuid, ISSC_SERVICE);
        assert_eq!(
            profile.write_characteristics,
            vec![ISSC_WRITE_PRIMARY, ISSC_WRITE_SECONDARY]
        );
        assert_eq!(profile.code_page, 0x16);
        assert_eq!(profile.charset, 0x08);
        assert_eq!(profile.columns, 32);
    }

    #[test]
    fn test_default_code_page_uses_windows_1256_bytes() {
        for profile in PrinterProfile::built_in() {
            assert_eq!(profile.code_page, DEFAULT_ARABIC_CODE_PAGE);
            assert_eq!(profile.encoding, CodePage::Windows1256);
        }
        // sheen, kaf, reh, alef as the reference printer expects them on page 0x16
        assert_eq!(
            PrinterProfile::default().encoding.encode("شكرا"),
            vec![0xD4, 0xDF, 0xD1, 0xC7]
        );
    }

    #[test]
    fn test_parse_by_key_and_name() {
        assert_eq!(PrinterProfile::parse("ISSC").unwrap(), PrinterProfile::issc());
        assert_eq!(
            PrinterProfile::parse("Generic BLE (18F0)").unwrap(),
            PrinterProfile::serial_18f0()
        );
        assert!(PrinterProfile::parse("tsp650ii").is_err());
    }

    #[test]
    fn test_default_timeouts() {
        let c = ConnectionConfig::default();
        assert_eq!(c.scan_window(), Duration::from_secs(10));
        assert_eq!(c.connect_timeout(), Duration::from_secs(10));
        assert_eq!(c.discovery_timeout(), Duration::from_secs(5));
        assert_eq!(c.reconnect_timeout(), Duration::from_secs(5));
        assert_eq!(c.reconnect_delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_default_strategy_order() {
        let t = TransmissionConfig::default();
        assert_eq!(
            t.strategies(),
            vec![
                Strategy::ByteByByte { delay_ms: 5 },
                Strategy::Chunked { size: 5, delay_ms: 20 },
            ]
        );
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let s = Settings::from_json(
            r#"{"profile": {"code_page": 40}, "transmission": {"chunk_size": 20}}"#,
        )
        .unwrap();
        assert_eq!(s.profile.code_page, 40);
        assert_eq!(s.profile.service_uuid, ISSC_SERVICE);
        assert_eq!(s.transmission.chunk_size, 20);
        assert_eq!(s.transmission.byte_delay_ms, 5);
        assert_eq!(s.connection, ConnectionConfig::default());
    }

    #[test]
    fn test_encoding_name_in_json() {
        let s = Settings::from_json(r#"{"profile": {"encoding": "iso-8859-6"}}"#).unwrap();
        assert_eq!(s.profile.encoding, CodePage::Iso8859_6);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = Settings::from_json(r#"{"transmission": {"chunk_size": 0}}"#).unwrap_err();
        assert!(matches!(err, WarraqError::Profile(_)));

        let err =
            Settings::from_json(r#"{"profile": {"write_characteristics": []}}"#).unwrap_err();
        assert!(matches!(err, WarraqError::Profile(_)));

        assert!(matches!(
            Settings::from_json("{ not json").unwrap_err(),
            WarraqError::Json(_)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"connection": {"connect_timeout_ms": 1234}}"#).unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.connection.connect_timeout_ms, 1234);
    }
}
