//! Serial Transport
//!
//! Opens the eBUS adapter 8N1 at the configured baud rate and hands out one
//! byte per call. Any read error or end of stream is reported as a
//! [`TransportError`]; the caller treats it as fatal.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::time::{timeout_at, Instant};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info};
use voltage_ebus::{ByteSource, TransportError};

use crate::config::SerialConfig;

/// Serial port byte source
pub struct SerialTransport {
    port_name: String,
    reader: BufReader<SerialStream>,
    bytes_received: u64,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.port_name)
            .field("bytes_received", &self.bytes_received)
            .finish()
    }
}

impl SerialTransport {
    /// Open the configured port
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        debug!("Opening serial port: {}", config.port);

        let port_result = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(config.read_timeout())
            .open_native_async();

        match port_result {
            Ok(port) => {
                info!(
                    "Opened serial port: {} @ {} baud",
                    config.port, config.baud_rate
                );
                Ok(Self {
                    port_name: config.port.clone(),
                    reader: BufReader::new(port),
                    bytes_received: 0,
                })
            },
            Err(e) => {
                let error_msg = format!("Failed to open serial port {}: {e}", config.port);
                error!("{error_msg}");
                Err(TransportError::ConnectionFailed(error_msg))
            },
        }
    }
}

#[async_trait]
impl ByteSource for SerialTransport {
    async fn read_byte(&mut self, deadline: Instant) -> Result<Option<u8>, TransportError> {
        loop {
            match timeout_at(deadline, self.reader.read_u8()).await {
                Ok(Ok(byte)) => {
                    self.bytes_received += 1;
                    return Ok(Some(byte));
                },
                // Driver-level read timeout, keep waiting for the deadline
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(TransportError::Closed(format!(
                        "Serial port {} closed after {} bytes",
                        self.port_name, self.bytes_received
                    )));
                },
                Ok(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(format!(
                        "Read from {} failed after {} bytes: {e}",
                        self.port_name, self.bytes_received
                    )));
                },
                Err(_) => return Ok(None),
            }
        }
    }
}
