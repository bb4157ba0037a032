//! Bus monitor read loop
//!
//! ```text
//! loop {
//!     select {
//!         shutdown       -> stop
//!         stats tick     -> log counters
//!         read_frame()   -> decode -> publish
//!     }
//! }
//! ```
//!
//! Per-frame errors are logged and counted, then the loop moves on. Only a
//! transport fault ends `run` with an error. Shutdown is observed between
//! frames; a frame that has been read is always processed to completion.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use voltage_ebus::{
    decode_frame, ByteSource, DecodeError, EbusError, FrameReader, Interpreter, RawFrame,
    ReaderStats,
};

use crate::config::AppConfig;
use crate::error::Result;
use crate::publisher::{publish_readings, PublishReadings};

/// Placeholder period when periodic statistics are off
const IDLE_STATS_PERIOD: Duration = Duration::from_secs(3600);

/// Read loop settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Wait for a complete frame before reporting a quiet bus
    pub frame_timeout: Duration,
    /// Period of the statistics log line, `None` disables it
    pub stats_interval: Option<Duration>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(60),
            stats_interval: Some(Duration::from_secs(300)),
        }
    }
}

impl From<&AppConfig> for MonitorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            frame_timeout: config.serial.frame_timeout(),
            stats_interval: config.runtime.stats_interval(),
        }
    }
}

/// Read loop counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Frames handed out by the reader
    pub frames: u64,
    /// Frames that passed validation
    pub valid: u64,
    pub readings: u64,
    pub published: u64,
    pub publish_failures: u64,
    /// Frame timeouts on a quiet bus
    pub timeouts: u64,
    /// Per-frame errors keyed by category
    pub errors: BTreeMap<&'static str, u64>,
    pub reader: ReaderStats,
}

impl MonitorStats {
    pub fn error_count(&self, category: &str) -> u64 {
        self.errors.get(category).copied().unwrap_or(0)
    }

    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }

    fn record_error(&mut self, category: &'static str) {
        *self.errors.entry(category).or_insert(0) += 1;
    }
}

impl fmt::Display for MonitorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} valid={} readings={} published={} publish_failures={} timeouts={} syn={} overruns={}",
            self.frames,
            self.valid,
            self.readings,
            self.published,
            self.publish_failures,
            self.timeouts,
            self.reader.syn_count,
            self.reader.overruns
        )?;
        for (category, count) in &self.errors {
            write!(f, " {category}={count}")?;
        }
        Ok(())
    }
}

enum LoopEvent {
    Shutdown,
    Stats,
    Frame(std::result::Result<Option<RawFrame>, EbusError>),
}

/// Reads, decodes and publishes frames until shutdown
pub struct BusMonitor<S, P> {
    reader: FrameReader<S>,
    interpreter: Interpreter,
    publisher: P,
    settings: MonitorSettings,
    stats: MonitorStats,
}

impl<S, P> BusMonitor<S, P>
where
    S: ByteSource,
    P: PublishReadings,
{
    pub fn new(source: S, publisher: P, settings: MonitorSettings) -> Self {
        Self {
            reader: FrameReader::new(source),
            interpreter: Interpreter::default(),
            publisher,
            settings,
            stats: MonitorStats::default(),
        }
    }

    pub fn stats(&self) -> MonitorStats {
        let mut stats = self.stats.clone();
        stats.reader = self.reader.stats();
        stats
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn into_publisher(self) -> P {
        self.publisher
    }

    /// Run until `cancel` fires or the transport fails
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<MonitorStats> {
        let period = self.settings.stats_interval.unwrap_or(IDLE_STATS_PERIOD);
        let stats_enabled = self.settings.stats_interval.is_some();
        let mut stats_tick = interval_at(Instant::now() + period, period);
        stats_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Bus monitor started (frame timeout {:?}, sink {})",
            self.settings.frame_timeout,
            self.publisher.name()
        );

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => LoopEvent::Shutdown,
                _ = stats_tick.tick(), if stats_enabled => LoopEvent::Stats,
                result = self.reader.read_frame(self.settings.frame_timeout) => LoopEvent::Frame(result),
            };

            match event {
                LoopEvent::Shutdown => {
                    info!("Bus monitor received cancellation signal, shutting down");
                    break;
                },
                LoopEvent::Stats => info!("Bus stats: {}", self.stats()),
                LoopEvent::Frame(Ok(Some(raw))) => self.process_frame(&raw).await,
                LoopEvent::Frame(Ok(None)) => {
                    self.stats.timeouts += 1;
                    debug!(
                        "No frame within {:?}, bus quiet",
                        self.settings.frame_timeout
                    );
                },
                LoopEvent::Frame(Err(e)) if e.is_fatal() => {
                    error!("Transport failure, stopping bus monitor: {}", e);
                    info!("Bus stats: {}", self.stats());
                    return Err(e.into());
                },
                LoopEvent::Frame(Err(e)) => {
                    self.stats.record_error(e.category());
                    warn!(category = e.category(), "Frame dropped: {}", e);
                },
            }
        }

        let stats = self.stats();
        info!("Bus stats: {}", stats);
        Ok(stats)
    }

    /// Decode one frame and publish its readings
    pub async fn process_frame(&mut self, raw: &RawFrame) {
        self.stats.frames += 1;

        match decode_frame(raw, &self.interpreter) {
            Ok(decoded) => {
                self.stats.valid += 1;
                self.stats.readings += decoded.readings.len() as u64;
                debug!(frame = %decoded.message, readings = decoded.readings.len(), "Frame decoded");

                if decoded.readings.is_empty() {
                    return;
                }
                let summary = publish_readings(&self.publisher, &decoded.readings).await;
                self.stats.published += summary.published;
                self.stats.publish_failures += summary.failed;
            },
            Err(e) => {
                self.stats.record_error(e.category());
                match &e {
                    EbusError::Decode(decode) => {
                        // Frame itself was valid
                        self.stats.valid += 1;
                        log_decode_error(decode, raw);
                    },
                    _ => warn!(
                        category = e.category(),
                        frame = %raw.hex_dump(),
                        "Invalid frame: {}",
                        e
                    ),
                }
            },
        }
    }
}

fn log_decode_error(error: &DecodeError, raw: &RawFrame) {
    match error {
        // Other bus participants, expected traffic
        DecodeError::UnknownClass { .. } => {
            debug!(frame = %raw.hex_dump(), "Not decoded: {}", error);
        },
        _ => info!(frame = %raw.hex_dump(), "Not decoded: {}", error),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::publisher::MemoryPublisher;
    use crate::transport::MockTransport;
    use voltage_ebus::TransportError;

    const SET_OPERATION_MODE: [u8; 8] = [0x10, 0xFE, 0xB5, 0x05, 0x02, 0x29, 0x00, 0x2C];

    const WATER_TARGET: [u8; 16] = [
        0x10, 0x08, 0xB5, 0x11, 0x01, 0x02, 0x8A, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x78, 0x3F,
        0x00,
    ];

    fn settings() -> MonitorSettings {
        MonitorSettings {
            frame_timeout: Duration::from_secs(1),
            stats_interval: None,
        }
    }

    #[tokio::test]
    async fn test_process_frame_publishes() {
        let mut monitor = BusMonitor::new(MockTransport::new(), MemoryPublisher::new(), settings());
        monitor.process_frame(&RawFrame::new(WATER_TARGET.to_vec())).await;

        let stats = monitor.stats();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.readings, 1);
        assert_eq!(stats.published, 1);
        assert_eq!(
            monitor.publisher().last("vem/water/target_temp"),
            Some("60.0".to_string())
        );
    }

    #[tokio::test]
    async fn test_process_frame_counts_errors() {
        let mut monitor = BusMonitor::new(MockTransport::new(), MemoryPublisher::new(), settings());

        let mut corrupted = SET_OPERATION_MODE;
        corrupted[5] = 0x28;
        monitor.process_frame(&RawFrame::new(corrupted.to_vec())).await;
        monitor.process_frame(&RawFrame::new(SET_OPERATION_MODE.to_vec())).await;

        let stats = monitor.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.error_count("checksum"), 1);
        assert_eq!(stats.readings, 0);
        assert!(monitor.publisher().messages().is_empty());
    }

    #[tokio::test]
    async fn test_transport_fault_ends_run() {
        let source = MockTransport::new()
            .with_frame(&WATER_TARGET)
            .with_fault(TransportError::Closed("unplugged".to_string()));
        let mut monitor = BusMonitor::new(source, MemoryPublisher::new(), settings());

        let err = monitor.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, crate::error::VemSrvError::TransportError(_)));
        assert_eq!(monitor.stats().published, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut monitor = BusMonitor::new(
            MockTransport::new().with_frame(&WATER_TARGET),
            MemoryPublisher::new(),
            settings(),
        );
        let stats = monitor.run(cancel).await.unwrap();
        assert_eq!(stats.frames, 0);
    }

    #[test]
    fn test_stats_display() {
        let mut stats = MonitorStats {
            frames: 3,
            valid: 2,
            ..MonitorStats::default()
        };
        stats.record_error("checksum");
        let line = stats.to_string();
        assert!(line.starts_with("frames=3 valid=2"));
        assert!(line.ends_with("checksum=1"));
        assert_eq!(stats.total_errors(), 1);
    }
}
