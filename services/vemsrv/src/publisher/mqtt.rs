//! MQTT publisher
//!
//! Publications are queued on the client handle with `try_publish` and never
//! awaited; a spawned task drives the event loop, which reconnects on its own
//! after connection errors.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::PublishReadings;
use crate::config::MqttConfig;
use crate::error::Result;

/// Pause before polling again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How long shutdown waits for the disconnect to go out
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Fire-and-forget MQTT sink
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
    retain: bool,
    event_task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl MqttPublisher {
    /// Create the client and start polling its event loop
    ///
    /// Returns immediately; the broker connection is established in the
    /// background and publications queue up until then.
    pub fn start(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, config.capacity);
        let broker = format!("{}:{}", config.host, config.port);
        let cancel = CancellationToken::new();
        let event_task = tokio::spawn(drive_event_loop(eventloop, broker, cancel.clone()));

        Self {
            client,
            qos: qos_from_level(config.qos),
            retain: config.retain,
            event_task,
            cancel,
        }
    }

    /// Disconnect and wait for the event loop task to end
    ///
    /// Gives up on a clean disconnect after a short timeout, e.g. when the
    /// broker was never reachable.
    pub async fn shutdown(self) {
        let Self {
            client,
            mut event_task,
            cancel,
            ..
        } = self;

        if let Err(e) = client.try_disconnect() {
            debug!("MQTT disconnect request not queued: {}", e);
        }
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut event_task)
            .await
            .is_err()
        {
            cancel.cancel();
            if let Err(e) = event_task.await {
                warn!("MQTT event loop task ended abnormally: {}", e);
            }
        }
    }
}

#[async_trait]
impl PublishReadings for MqttPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        self.client.try_publish(topic, self.qos, self.retain, payload)?;
        debug!("Published message to topic: {}", topic);
        Ok(())
    }

    fn name(&self) -> &str {
        "mqtt"
    }
}

/// Map the configured level onto rumqttc's QoS
pub fn qos_from_level(level: u8) -> QoS {
    match level {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

async fn drive_event_loop(mut eventloop: EventLoop, broker: String, cancel: CancellationToken) {
    let mut connected = false;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected = true;
                    info!("Connected to MQTT broker: {}", broker);
                },
                Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                    info!("Disconnecting from MQTT broker: {}", broker);
                    break;
                },
                Ok(notification) => {
                    debug!("MQTT Event: {:?}", notification);
                },
                Err(e) => {
                    if connected {
                        error!("MQTT connection to {} lost: {}", broker, e);
                        connected = false;
                    } else {
                        warn!("MQTT broker {} unreachable: {}", broker, e);
                    }
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(RECONNECT_DELAY) => {},
                    }
                },
            },
        }
    }

    debug!("MQTT event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_mapping() {
        assert_eq!(qos_from_level(0), QoS::AtMostOnce);
        assert_eq!(qos_from_level(1), QoS::AtLeastOnce);
        assert_eq!(qos_from_level(2), QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_publish_queues_without_broker() {
        let config = MqttConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            capacity: 4,
            ..MqttConfig::default()
        };
        let publisher = MqttPublisher::start(&config);

        // Queued locally, no broker needed
        assert!(publisher
            .publish("vem/temp/outside", "12.5".to_string())
            .await
            .is_ok());

        publisher.shutdown().await;
    }
}
