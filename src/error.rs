//! # Error Types
//!
//! This module defines error types used throughout the warraq library.
//!
//! Every error falls into one [`FailureKind`] so the caller can tell the user
//! whether to fix settings, switch Bluetooth on, move closer to the printer,
//! or reconnect. Encoding never produces an error: unmapped characters print
//! as `?`.

use std::time::Duration;

use thiserror::Error;

use crate::transport::AdapterState;

/// Main error type for warraq operations
#[derive(Debug, Error)]
pub enum WarraqError {
    /// The Bluetooth stack could not be initialized at all
    #[error("Bluetooth unavailable: {0}")]
    Unavailable(String),

    /// Platform permissions for scanning/connecting were not granted
    #[error("Bluetooth permission denied: {0}")]
    PermissionDenied(String),

    /// Adapter is present but not usable (powered off, unauthorized)
    #[error("Bluetooth adapter is {0}")]
    Adapter(AdapterState),

    /// Link establishment or discovery did not finish in time
    #[error("Timed out after {0:?} while {1}")]
    Timeout(Duration, &'static str),

    /// Link establishment failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// An operation needed a link and there is none
    #[error("No printer connected")]
    NotConnected,

    /// Vendor service or writable characteristic not found
    #[error("Service discovery failed: {0}")]
    Discovery(String),

    /// A single GATT write failed
    #[error("Write failed: {0}")]
    Write(String),

    /// Every transmission strategy failed
    #[error("Transmission failed: {0}")]
    Transmission(String),

    /// Invalid printer profile or settings
    #[error("Invalid profile: {0}")]
    Profile(String),

    /// Bonded printer record could not be read or written
    #[error("Bond store error: {0}")]
    BondStore(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the user has to do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bluetooth cannot be used on this platform/build
    Unavailable,
    /// Grant permissions in system settings
    Permission,
    /// Turn the Bluetooth adapter on
    AdapterOff,
    /// Printer out of range, switched off, or busy
    Unreachable,
    /// Link is up but the data did not go through
    Transmission,
    /// Bad profile, settings, or local storage
    Configuration,
}

impl WarraqError {
    /// Classify the error for user-facing handling.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Unavailable(_) => FailureKind::Unavailable,
            Self::PermissionDenied(_) => FailureKind::Permission,
            Self::Adapter(AdapterState::Unauthorized) => FailureKind::Permission,
            Self::Adapter(_) => FailureKind::AdapterOff,
            Self::Timeout(..) | Self::Connection(_) | Self::NotConnected => {
                FailureKind::Unreachable
            }
            Self::Discovery(_) | Self::Write(_) | Self::Transmission(_) => {
                FailureKind::Transmission
            }
            Self::Profile(_) | Self::BondStore(_) | Self::Io(_) | Self::Json(_) => {
                FailureKind::Configuration
            }
        }
    }

    /// Whether this failure came from service/characteristic discovery.
    ///
    /// The transmission engine reconnects once on these.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(self, Self::Discovery(_))
    }

    /// Human-readable message with the action the user should take.
    pub fn user_message(&self) -> String {
        let advice = match self.kind() {
            FailureKind::Unavailable => {
                "Bluetooth printing is not available on this device or build."
            }
            FailureKind::Permission => {
                "Bluetooth permission is missing. Grant Bluetooth (and location) permission in the system settings, then try again."
            }
            FailureKind::AdapterOff => {
                "Bluetooth is turned off. Turn Bluetooth on, then try again."
            }
            FailureKind::Unreachable => {
                "The printer could not be reached. Make sure it is switched on and nearby, then reconnect."
            }
            FailureKind::Transmission => {
                "The printer is connected but did not accept the data. Reconnect to the printer and print again."
            }
            FailureKind::Configuration => "The printer settings are invalid.",
        };
        format!("{}\n\nError: {}", advice, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_distinguish_user_actions() {
        assert_eq!(
            WarraqError::PermissionDenied("scan".into()).kind(),
            FailureKind::Permission
        );
        assert_eq!(
            WarraqError::Adapter(AdapterState::PoweredOff).kind(),
            FailureKind::AdapterOff
        );
        assert_eq!(
            WarraqError::Adapter(AdapterState::Unauthorized).kind(),
            FailureKind::Permission
        );
        assert_eq!(
            WarraqError::Timeout(Duration::from_secs(10), "connecting").kind(),
            FailureKind::Unreachable
        );
        assert_eq!(
            WarraqError::Transmission("all strategies failed".into()).kind(),
            FailureKind::Transmission
        );
        assert_eq!(
            WarraqError::Unavailable("no adapter".into()).kind(),
            FailureKind::Unavailable
        );
    }

    #[test]
    fn test_user_messages_differ_per_kind() {
        let messages = [
            WarraqError::PermissionDenied("x".into()).user_message(),
            WarraqError::Adapter(AdapterState::PoweredOff).user_message(),
            WarraqError::NotConnected.user_message(),
            WarraqError::Write("x".into()).user_message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a.lines().next(), b.lines().next());
            }
        }
    }

    #[test]
    fn test_user_message_includes_detail() {
        let msg = WarraqError::Connection("peer refused".into()).user_message();
        assert!(msg.contains("nearby"));
        assert!(msg.contains("peer refused"));
    }

    #[test]
    fn test_discovery_failure_flag() {
        assert!(WarraqError::Discovery("no service".into()).is_discovery_failure());
        assert!(!WarraqError::Write("x".into()).is_discovery_failure());
    }
}
