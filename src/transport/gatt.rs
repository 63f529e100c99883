//! GATT descriptors and write-characteristic election.
//!
//! A printer link is usable once exactly one writable characteristic inside
//! the vendor service has been elected. The candidates are tried in the
//! profile's priority order; the first one present with either write
//! property wins.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WarraqError;

/// ISSC transparent-UART service exposed by most BLE thermal printers
pub const ISSC_SERVICE: Uuid = Uuid::from_u128(0x49535343_fe7d_4ae5_8fa9_9fafd205e455);

/// Preferred ISSC write characteristic
pub const ISSC_WRITE_PRIMARY: Uuid = Uuid::from_u128(0x49535343_1e4d_4bd9_ba61_23c647249616);

/// Secondary ISSC write characteristic
pub const ISSC_WRITE_SECONDARY: Uuid = Uuid::from_u128(0x49535343_8841_43f4_a8d4_ecbe34729bb3);

/// How a payload is written to the characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Acknowledged write (ATT Write Request)
    WithResponse,
    /// Unacknowledged write (ATT Write Command)
    WithoutResponse,
}

/// A discovered characteristic and its write capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDescriptor {
    pub uuid: Uuid,
    pub write_with_response: bool,
    pub write_without_response: bool,
}

impl CharacteristicDescriptor {
    pub fn is_writable(&self) -> bool {
        self.write_with_response || self.write_without_response
    }

    /// Preferred write mode: acknowledged when supported.
    pub fn write_mode(&self) -> Option<WriteMode> {
        if self.write_with_response {
            Some(WriteMode::WithResponse)
        } else if self.write_without_response {
            Some(WriteMode::WithoutResponse)
        } else {
            None
        }
    }
}

/// A discovered service and its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicDescriptor>,
}

/// The elected write path for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTarget {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub mode: WriteMode,
}

/// Elect the write characteristic inside the vendor service.
///
/// Errors are always [`WarraqError::Discovery`].
pub fn elect_write_target(
    services: &[ServiceDescriptor],
    service_uuid: Uuid,
    priority: &[Uuid],
) -> Result<WriteTarget, WarraqError> {
    let service = services
        .iter()
        .find(|s| s.uuid == service_uuid)
        .ok_or_else(|| {
            WarraqError::Discovery(format!(
                "print service {} not found ({} services advertised)",
                service_uuid,
                services.len()
            ))
        })?;

    for wanted in priority {
        let found = service
            .characteristics
            .iter()
            .find(|c| c.uuid == *wanted)
            .and_then(|c| c.write_mode().map(|mode| (c, mode)));

        if let Some((c, mode)) = found {
            tracing::debug!(characteristic = %c.uuid, ?mode, "elected write characteristic");
            return Ok(WriteTarget {
                service: service.uuid,
                characteristic: c.uuid,
                mode,
            });
        }
    }

    Err(WarraqError::Discovery(format!(
        "no writable characteristic found for printing in service {}",
        service_uuid
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: Uuid = ISSC_SERVICE;
    const FIRST: Uuid = ISSC_WRITE_PRIMARY;
    const SECOND: Uuid = ISSC_WRITE_SECONDARY;
    const OTHER_SERVICE: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);

    fn ch(uuid: Uuid, with: bool, without: bool) -> CharacteristicDescriptor {
        CharacteristicDescriptor {
            uuid,
            write_with_response: with,
            write_without_response: without,
        }
    }

    fn service(uuid: Uuid, characteristics: Vec<CharacteristicDescriptor>) -> ServiceDescriptor {
        ServiceDescriptor {
            uuid,
            characteristics,
        }
    }

    #[test]
    fn test_first_priority_wins_when_writable() {
        let services = vec![service(
            SERVICE,
            vec![ch(SECOND, true, false), ch(FIRST, false, true)],
        )];
        let target = elect_write_target(&services, SERVICE, &[FIRST, SECOND]).unwrap();
        assert_eq!(target.characteristic, FIRST);
        assert_eq!(target.mode, WriteMode::WithoutResponse);
    }

    #[test]
    fn test_falls_back_when_first_not_writable() {
        let services = vec![service(
            SERVICE,
            vec![ch(FIRST, false, false), ch(SECOND, true, true)],
        )];
        let target = elect_write_target(&services, SERVICE, &[FIRST, SECOND]).unwrap();
        assert_eq!(target.characteristic, SECOND);
        assert_eq!(target.mode, WriteMode::WithResponse);
    }

    #[test]
    fn test_priority_order_is_configuration() {
        let services = vec![service(SERVICE, vec![ch(FIRST, true, false), ch(SECOND, true, false)])];
        let target = elect_write_target(&services, SERVICE, &[SECOND, FIRST]).unwrap();
        assert_eq!(target.characteristic, SECOND);
    }

    #[test]
    fn test_missing_service_is_discovery_failure() {
        let services = vec![service(OTHER_SERVICE, vec![ch(FIRST, true, true)])];
        let err = elect_write_target(&services, SERVICE, &[FIRST]).unwrap_err();
        assert!(err.is_discovery_failure());
    }

    #[test]
    fn test_characteristic_outside_vendor_service_ignored() {
        let services = vec![
            service(OTHER_SERVICE, vec![ch(FIRST, true, true)]),
            service(SERVICE, vec![]),
        ];
        let err = elect_write_target(&services, SERVICE, &[FIRST]).unwrap_err();
        assert!(err.is_discovery_failure());
    }

    #[test]
    fn test_write_mode_prefers_acknowledged() {
        assert_eq!(ch(FIRST, true, true).write_mode(), Some(WriteMode::WithResponse));
        assert_eq!(ch(FIRST, false, true).write_mode(), Some(WriteMode::WithoutResponse));
        assert_eq!(ch(FIRST, false, false).write_mode(), None);
    }
}
