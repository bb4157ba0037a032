//! Mock Transport
//!
//! Replays scripted line bytes. Once the script is drained it either behaves
//! like a quiet bus (waits for the deadline, returns `Ok(None)`) or reports a
//! configured fault.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use voltage_ebus::{escape, ByteSource, TransportError};

/// Scripted byte source
#[derive(Debug, Default)]
pub struct MockTransport {
    receive_queue: VecDeque<u8>,
    /// Returned once the queue is empty
    fault: Option<TransportError>,
    /// Simulated delay before each byte
    byte_delay: Option<Duration>,
    bytes_received: u64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw line bytes, appended as-is
    pub fn with_bytes(mut self, bytes: &[u8]) -> Self {
        self.receive_queue.extend(bytes.iter().copied());
        self
    }

    /// A logical frame: line-escaped and terminated with SYN
    pub fn with_frame(mut self, frame: &[u8]) -> Self {
        self.receive_queue.extend(escape(frame));
        self.receive_queue.push_back(voltage_ebus::constants::SYN);
        self
    }

    /// Fail with `error` after the script is drained
    pub fn with_fault(mut self, error: TransportError) -> Self {
        self.fault = Some(error);
        self
    }

    /// Pace the script, one byte per `delay`
    pub fn with_byte_delay(mut self, delay: Duration) -> Self {
        self.byte_delay = Some(delay);
        self
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }
}

#[async_trait]
impl ByteSource for MockTransport {
    async fn read_byte(&mut self, deadline: Instant) -> Result<Option<u8>, TransportError> {
        if let Some(delay) = self.byte_delay {
            let ready_at = Instant::now() + delay;
            if ready_at > deadline {
                tokio::time::sleep_until(deadline).await;
                return Ok(None);
            }
            tokio::time::sleep_until(ready_at).await;
        }

        match self.receive_queue.pop_front() {
            Some(byte) => {
                self.bytes_received += 1;
                Ok(Some(byte))
            },
            None => match &self.fault {
                Some(error) => Err(error.clone()),
                None => {
                    tokio::time::sleep_until(deadline).await;
                    Ok(None)
                },
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_frame_is_escaped_and_terminated() {
        let mut mock = MockTransport::new().with_frame(&[0x01, 0xAA, 0xA9]);
        let deadline = Instant::now() + Duration::from_secs(1);

        let mut line = Vec::new();
        while let Some(byte) = mock.read_byte(deadline).await.unwrap() {
            line.push(byte);
        }
        assert_eq!(line, vec![0x01, 0xA9, 0x01, 0xA9, 0x00, 0xAA]);
        assert_eq!(mock.bytes_received(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drained_queue_waits_for_deadline() {
        let mut mock = MockTransport::new();
        let start = Instant::now();
        let deadline = start + Duration::from_secs(5);
        assert_eq!(mock.read_byte(deadline).await.unwrap(), None);
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test]
    async fn test_fault_after_script() {
        let mut mock = MockTransport::new()
            .with_bytes(&[0xAA])
            .with_fault(TransportError::Closed("unplugged".to_string()));
        let deadline = Instant::now() + Duration::from_secs(1);
        assert_eq!(mock.read_byte(deadline).await.unwrap(), Some(0xAA));
        assert!(mock.read_byte(deadline).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_byte_delay_past_deadline() {
        let mut mock = MockTransport::new()
            .with_bytes(&[0x10, 0x08])
            .with_byte_delay(Duration::from_millis(400));
        let start = Instant::now();
        let deadline = start + Duration::from_secs(1);

        assert_eq!(mock.read_byte(deadline).await.unwrap(), Some(0x10));
        assert_eq!(mock.read_byte(deadline).await.unwrap(), Some(0x08));
        assert_eq!(start.elapsed(), Duration::from_millis(800));

        // The next delay would end after the deadline
        let mut mock = mock.with_bytes(&[0xAA]);
        assert_eq!(mock.read_byte(deadline).await.unwrap(), None);
        assert_eq!(Instant::now(), deadline);
        assert_eq!(mock.bytes_received(), 2);
    }
}
