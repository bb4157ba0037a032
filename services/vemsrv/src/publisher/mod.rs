//! Reading publishers
//!
//! Readings with a topic are forwarded as `topic -> payload` pairs. Delivery is
//! fire-and-forget: a failed publish is logged and counted, never retried.

pub mod memory;
pub mod mqtt;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use voltage_ebus::Reading;

use crate::error::Result;

pub use memory::MemoryPublisher;
pub use mqtt::MqttPublisher;

/// Publish sink
#[async_trait]
pub trait PublishReadings: Send + Sync {
    /// Hand one value to the sink without waiting for delivery
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;

    /// Sink name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<P: PublishReadings + ?Sized> PublishReadings for Box<P> {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        (**self).publish(topic, payload).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Outcome of forwarding one frame's readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: u64,
    pub failed: u64,
    /// Readings without a topic
    pub skipped: u64,
}

/// Forward every reading that has a topic
pub async fn publish_readings<P>(publisher: &P, readings: &[Reading]) -> PublishSummary
where
    P: PublishReadings + ?Sized,
{
    let mut summary = PublishSummary::default();

    for reading in readings {
        let Some(topic) = reading.topic() else {
            debug!(
                metric = %reading.metric,
                value = %reading.value,
                "Reading not published"
            );
            summary.skipped += 1;
            continue;
        };

        match publisher.publish(topic, reading.value.to_payload()).await {
            Ok(()) => summary.published += 1,
            Err(e) => {
                warn!(topic, sink = publisher.name(), "Publish failed: {}", e);
                summary.failed += 1;
            },
        }
    }

    summary
}

/// Dry-run sink, logs every value
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl PublishReadings for LogPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        info!("{} = {}", topic, payload);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use tracing_test::traced_test;
    use voltage_ebus::{Command, Metric};

    fn readings() -> Vec<Reading> {
        let cmd = Command::new(0xB5, 0x11);
        vec![
            Reading::number(Metric::WaterTargetTemp, 60.0, cmd),
            Reading::number(Metric::HeatingSetpoint, 20.0, cmd),
            Reading::flag(Metric::HeatingEnabled, true, cmd),
        ]
    }

    #[tokio::test]
    async fn test_only_topics_are_published() {
        let publisher = MemoryPublisher::new();
        let summary = publish_readings(&publisher, &readings()).await;

        assert_eq!(
            summary,
            PublishSummary {
                published: 2,
                failed: 0,
                skipped: 1
            }
        );
        assert_eq!(
            publisher.messages(),
            vec![
                ("vem/water/target_temp".to_string(), "60.0".to_string()),
                ("vem/heating/enabled".to_string(), "true".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_are_counted() {
        let publisher = MemoryPublisher::failing();
        let summary = publish_readings(&publisher, &readings()).await;
        assert_eq!(summary.published, 0);
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_log_publisher() {
        let summary = publish_readings(&LogPublisher, &readings()).await;
        assert_eq!(summary.published, 2);
        assert!(logs_contain("vem/water/target_temp = 60.0"));
    }
}
