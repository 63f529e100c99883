//! # Transmission Engine
//!
//! Delivers a finished [`PrintJob`] over the current link:
//!
//! 1. Enumerate services and elect the write characteristic.
//! 2. If that fails, reconnect once and elect again.
//! 3. Send the bytes with the configured strategies, in order.
//!
//! A second discovery failure, a failed reconnect, or every strategy failing
//! ends the job with an error. The job is consumed either way.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::config::{PrinterProfile, TransmissionConfig};
use super::manager::ConnectionHandle;
use crate::error::WarraqError;
use crate::receipt::PrintJob;
use crate::transport::gatt::elect_write_target;
use crate::transport::strategy::send_with_fallback;
use crate::transport::{Strategy, WriteTarget};

/// Something that can replace a broken link with a fresh one.
#[async_trait]
pub trait Reconnect: Send + Sync {
    async fn reconnect(&self) -> Result<ConnectionHandle, WarraqError>;
}

/// Sends print jobs to the elected write characteristic.
#[derive(Debug, Clone)]
pub struct Transmitter {
    service_uuid: Uuid,
    priority: Vec<Uuid>,
    strategies: Vec<Strategy>,
    write_timeout: Duration,
}

impl Transmitter {
    pub fn new(profile: &PrinterProfile, config: &TransmissionConfig) -> Self {
        Self {
            service_uuid: profile.service_uuid,
            priority: profile.write_characteristics.clone(),
            strategies: config.strategies(),
            write_timeout: config.write_timeout(),
        }
    }

    /// Replace the strategy list.
    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Elect the write characteristic on the handle's link.
    ///
    /// Every failure here is a discovery failure.
    pub async fn discover(&self, handle: &ConnectionHandle) -> Result<WriteTarget, WarraqError> {
        if !handle.is_valid() {
            return Err(WarraqError::Discovery("connection handle was replaced".into()));
        }
        let services = handle.link().services().await.map_err(|e| {
            if e.is_discovery_failure() {
                e
            } else {
                WarraqError::Discovery(e.to_string())
            }
        })?;
        elect_write_target(&services, self.service_uuid, &self.priority)
    }

    /// Send the job, reconnecting once if discovery fails.
    pub async fn transmit(
        &self,
        job: PrintJob,
        handle: &ConnectionHandle,
        reconnector: &dyn Reconnect,
    ) -> Result<(), WarraqError> {
        let bytes = job.into_bytes();

        let (handle, target) = match self.discover(handle).await {
            Ok(target) => (handle.clone(), target),
            Err(e) if e.is_discovery_failure() => {
                tracing::warn!(error = %e, "discovery failed, reconnecting once");
                let fresh = reconnector.reconnect().await?;
                let target = self.discover(&fresh).await?;
                (fresh, target)
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            bytes = bytes.len(),
            characteristic = %target.characteristic,
            mode = ?target.mode,
            "sending print job"
        );

        let used = send_with_fallback(
            handle.link(),
            &target,
            &bytes,
            &self.strategies,
            self.write_timeout,
        )
        .await?;

        tracing::info!(strategy = used.name(), "print job sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::printer::bond::MemoryBondStore;
    use crate::printer::config::ConnectionConfig;
    use crate::printer::manager::{ConnectionManager, ConnectionState};
    use crate::transport::mock::SimulatedBackend;
    use crate::transport::PrinterDevice;

    fn fast() -> (Arc<SimulatedBackend>, ConnectionManager, Transmitter) {
        let sim = Arc::new(SimulatedBackend::new());
        let config = ConnectionConfig {
            reconnect_delay_ms: 1,
            ..ConnectionConfig::default()
        };
        let manager = ConnectionManager::new(sim.clone(), Box::new(MemoryBondStore::new()), config);
        let transmitter = Transmitter::new(&PrinterProfile::issc(), &TransmissionConfig::default())
            .with_strategies(vec![
                Strategy::ByteByByte { delay_ms: 0 },
                Strategy::Chunked { size: 5, delay_ms: 0 },
            ]);
        (sim, manager, transmitter)
    }

    fn job() -> PrintJob {
        PrintJob::from_bytes(vec![0x1B, 0x40, b'H', b'i', 0x0A])
    }

    async fn connected(manager: &ConnectionManager) -> ConnectionHandle {
        let device = PrinterDevice::new("00:11:22:33:44:55", None);
        manager.connect(&device).await.unwrap()
    }

    #[tokio::test]
    async fn test_transmit_sends_exact_bytes() {
        let (sim, manager, tx) = fast();
        let handle = connected(&manager).await;
        tx.transmit(job(), &handle, &manager).await.unwrap();
        assert_eq!(sim.received(), vec![0x1B, 0x40, b'H', b'i', 0x0A]);
        assert_eq!(sim.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_discovery_failure_reconnects_once() {
        let (sim, manager, tx) = fast();
        let handle = connected(&manager).await;
        sim.fail_next_discoveries(1);

        tx.transmit(job(), &handle, &manager).await.unwrap();
        assert_eq!(sim.connect_count(), 2);
        assert!(!handle.is_valid());
        assert_eq!(sim.received(), vec![0x1B, 0x40, b'H', b'i', 0x0A]);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_second_discovery_failure_is_permanent() {
        let (sim, manager, tx) = fast();
        let handle = connected(&manager).await;
        sim.fail_next_discoveries(2);

        let err = tx.transmit(job(), &handle, &manager).await.unwrap_err();
        assert!(err.is_discovery_failure());
        assert_eq!(sim.connect_count(), 2);
        assert!(sim.writes().is_empty());
    }

    #[tokio::test]
    async fn test_lost_link_goes_through_reconnect() {
        let (sim, manager, tx) = fast();
        let handle = connected(&manager).await;
        sim.drop_link();

        tx.transmit(job(), &handle, &manager).await.unwrap();
        assert_eq!(sim.connect_count(), 2);
        assert_eq!(sim.received().len(), 5);
    }

    #[tokio::test]
    async fn test_missing_vendor_service() {
        let (sim, manager, tx) = fast();
        sim.set_services(Vec::new());
        let handle = connected(&manager).await;
        let err = tx.transmit(job(), &handle, &manager).await.unwrap_err();
        assert!(err.is_discovery_failure());
    }

    #[tokio::test]
    async fn test_all_strategies_fail() {
        let (sim, manager, tx) = fast();
        let handle = connected(&manager).await;
        sim.fail_all_writes(true);
        let err = tx.transmit(job(), &handle, &manager).await.unwrap_err();
        assert!(matches!(err, WarraqError::Transmission(_)));
    }
}
