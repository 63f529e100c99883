//! # Transmission Strategies
//!
//! Cheap BLE printers disagree about how much data one GATT write may carry
//! and how fast writes may follow each other. A print job is therefore sent
//! with an ordered list of strategies; the first one that delivers the whole
//! buffer wins.
//!
//! | Strategy     | Payload per write | Pause after write |
//! |--------------|-------------------|-------------------|
//! | `ByteByByte` | 1 byte            | `delay_ms` (5)    |
//! | `Chunked`    | `size` bytes (5)  | `delay_ms` (20)   |
//!
//! A strategy that fails part-way is abandoned and the next strategy starts
//! again from the first byte. The printer may therefore receive a prefix of
//! the job twice; ESC/POS printers resynchronize on the `ESC @` that starts
//! every job.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{BleLink, WriteTarget};
use crate::error::WarraqError;

/// One way of splitting a buffer into GATT writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    ByteByByte { delay_ms: u64 },
    Chunked { size: usize, delay_ms: u64 },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ByteByByte { .. } => "byte-by-byte",
            Self::Chunked { .. } => "chunked",
        }
    }

    /// Bytes per write. Never zero.
    pub fn chunk_size(&self) -> usize {
        match self {
            Self::ByteByByte { .. } => 1,
            Self::Chunked { size, .. } => (*size).max(1),
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            Self::ByteByByte { delay_ms } | Self::Chunked { delay_ms, .. } => {
                Duration::from_millis(*delay_ms)
            }
        }
    }

    /// Split `data` into the payloads this strategy writes.
    pub fn payloads<'a>(&self, data: &'a [u8]) -> std::slice::Chunks<'a, u8> {
        data.chunks(self.chunk_size())
    }

    /// Write the whole buffer, pausing between writes.
    ///
    /// Each write is bounded by `write_timeout`; the first failed write
    /// aborts the strategy.
    pub async fn send(
        &self,
        link: &dyn BleLink,
        target: &WriteTarget,
        data: &[u8],
        write_timeout: Duration,
    ) -> Result<(), WarraqError> {
        let total = data.len().div_ceil(self.chunk_size());
        let delay = self.delay();

        for (i, payload) in self.payloads(data).enumerate() {
            match tokio::time::timeout(write_timeout, link.write(target, payload)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(WarraqError::Write(format!("write {}/{}: {}", i + 1, total, e)));
                }
                Err(_) => {
                    return Err(WarraqError::Write(format!(
                        "write {}/{} timed out after {:?}",
                        i + 1,
                        total,
                        write_timeout
                    )));
                }
            }
            if i + 1 < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }
}

/// Try each strategy in order until one delivers the whole buffer.
///
/// Returns the strategy that succeeded.
///
/// ## Errors
///
/// [`WarraqError::Transmission`] naming the last failure when every
/// strategy failed (or the list was empty).
pub async fn send_with_fallback(
    link: &dyn BleLink,
    target: &WriteTarget,
    data: &[u8],
    strategies: &[Strategy],
    write_timeout: Duration,
) -> Result<Strategy, WarraqError> {
    let mut last_error = None;

    for strategy in strategies {
        tracing::debug!(strategy = strategy.name(), bytes = data.len(), "sending");
        match strategy.send(link, target, data, write_timeout).await {
            Ok(()) => return Ok(*strategy),
            Err(e) => {
                tracing::warn!(strategy = strategy.name(), error = %e, "strategy failed");
                last_error = Some(e);
            }
        }
    }

    Err(WarraqError::Transmission(match last_error {
        Some(e) => format!("all {} strategies failed, last: {}", strategies.len(), e),
        None => "no transmission strategy configured".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::gatt::{ISSC_SERVICE, ISSC_WRITE_PRIMARY};
    use crate::transport::mock::SimulatedBackend;
    use crate::transport::{BleBackend, WriteMode};

    const BYTE: Strategy = Strategy::ByteByByte { delay_ms: 0 };
    const CHUNK: Strategy = Strategy::Chunked { size: 5, delay_ms: 0 };

    fn target() -> WriteTarget {
        WriteTarget {
            service: ISSC_SERVICE,
            characteristic: ISSC_WRITE_PRIMARY,
            mode: WriteMode::WithoutResponse,
        }
    }

    fn job() -> Vec<u8> {
        (0u8..=22).collect()
    }

    #[test]
    fn test_payloads_cover_buffer() {
        let data = job();
        let chunks: Vec<&[u8]> = CHUNK.payloads(&data).collect();
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.len() <= 5));
        assert_eq!(chunks.concat(), data);
        assert_eq!(BYTE.payloads(&data).count(), data.len());
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let s = Strategy::Chunked { size: 0, delay_ms: 0 };
        assert_eq!(s.chunk_size(), 1);
    }

    #[tokio::test]
    async fn test_byte_by_byte_reproduces_buffer() {
        let sim = SimulatedBackend::new();
        let link = sim.connect("00:11:22:33:44:55").await.unwrap();
        let used = send_with_fallback(&*link, &target(), &job(), &[BYTE, CHUNK], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(used, BYTE);
        assert_eq!(sim.writes().len(), job().len());
        assert_eq!(sim.received(), job());
    }

    #[tokio::test]
    async fn test_falls_back_and_resends_from_start() {
        let sim = SimulatedBackend::new();
        let link = sim.connect("00:11:22:33:44:55").await.unwrap();
        sim.fail_one_write_after(3);

        let used = send_with_fallback(&*link, &target(), &job(), &[BYTE, CHUNK], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(used, CHUNK);

        let writes = sim.writes();
        // three single bytes from the abandoned attempt, then the full job in chunks
        assert_eq!(writes[..3].concat(), vec![0, 1, 2]);
        assert_eq!(writes[3..].concat(), job());
        assert!(writes[3..].iter().all(|w| w.len() <= 5));
    }

    #[tokio::test]
    async fn test_all_strategies_failing_is_transmission_error() {
        let sim = SimulatedBackend::new();
        let link = sim.connect("00:11:22:33:44:55").await.unwrap();
        sim.fail_all_writes(true);

        let err = send_with_fallback(&*link, &target(), &job(), &[BYTE, CHUNK], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WarraqError::Transmission(_)));
        assert!(sim.writes().is_empty());
    }

    #[tokio::test]
    async fn test_empty_strategy_list() {
        let sim = SimulatedBackend::new();
        let link = sim.connect("00:11:22:33:44:55").await.unwrap();
        let err = send_with_fallback(&*link, &target(), &job(), &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WarraqError::Transmission(_)));
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&CHUNK).unwrap();
        assert_eq!(json, r#"{"kind":"chunked","size":5,"delay_ms":0}"#);
    }
}
