//! Frame synchronization
//!
//! Pulls bytes from a [`ByteSource`] until a SYN symbol closes the current
//! frame, then reverses the line escaping.
//!
//! ```text
//! ... AA AA 10 FE B5 16 03 01 A9 01 0C 5A AA ...
//!           |<------------ frame ---------->|
//!                                  A9 01 -> AA
//! ```
//!
//! A quiet bus is not an error: if the overall deadline passes without a SYN,
//! `read_frame` returns `Ok(None)`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::constants::{MAX_RAW_FRAME_LEN, SYN};
use crate::error::{EbusError, FramingError, TransportError};
use crate::escape::unescape;
use crate::frame::RawFrame;

/// Byte-at-a-time input
#[async_trait]
pub trait ByteSource: Send {
    /// Read one byte, or `Ok(None)` once `deadline` has passed
    async fn read_byte(&mut self, deadline: Instant) -> Result<Option<u8>, TransportError>;
}

#[async_trait]
impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    async fn read_byte(&mut self, deadline: Instant) -> Result<Option<u8>, TransportError> {
        (**self).read_byte(deadline).await
    }
}

/// Reader counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Line bytes received, SYN included
    pub bytes: u64,
    pub syn_count: u64,
    /// Non-empty frames handed out, including ones that failed unescaping
    pub frames: u64,
    pub overruns: u64,
}

/// Splits a byte stream into de-escaped frames
pub struct FrameReader<S> {
    source: S,
    buffer: Vec<u8>,
    /// Dropping bytes until the next SYN after an overrun
    resync: bool,
    stats: ReaderStats,
}

impl<S: ByteSource> FrameReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: Vec::with_capacity(MAX_RAW_FRAME_LEN),
            resync: false,
            stats: ReaderStats::default(),
        }
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Read the next non-empty frame
    ///
    /// - `Ok(Some(frame))`: bytes between two SYN symbols, unescaped
    /// - `Ok(None)`: no SYN before `overall_timeout` elapsed
    /// - `Err(Framing)`: malformed escape or overrun, the frame is dropped
    /// - `Err(Transport)`: the source failed
    pub async fn read_frame(
        &mut self,
        overall_timeout: Duration,
    ) -> Result<Option<RawFrame>, EbusError> {
        let deadline = Instant::now() + overall_timeout;

        loop {
            let Some(byte) = self.source.read_byte(deadline).await? else {
                if !self.buffer.is_empty() {
                    trace!(pending = self.buffer.len(), "Partial frame discarded");
                    self.buffer.clear();
                }
                trace!("No frame within {:?}", overall_timeout);
                return Ok(None);
            };
            self.stats.bytes += 1;

            if byte != SYN {
                if self.resync {
                    continue;
                }
                self.buffer.push(byte);
                if self.buffer.len() > MAX_RAW_FRAME_LEN {
                    let len = self.buffer.len();
                    self.buffer.clear();
                    self.resync = true;
                    self.stats.overruns += 1;
                    return Err(FramingError::Overrun { len }.into());
                }
                continue;
            }

            self.stats.syn_count += 1;
            if self.resync {
                self.resync = false;
                continue;
            }
            // Consecutive SYN symbols: idle bus
            if self.buffer.is_empty() {
                continue;
            }

            self.stats.frames += 1;
            let result = unescape(&self.buffer);
            self.buffer.clear();
            let bytes = result?;
            debug!(len = bytes.len(), "Frame received");
            return Ok(Some(RawFrame::new(bytes)));
        }
    }
}
