//! eBUS Monitor Service (vemsrv)
//!
//! Reads the heating controller's eBUS and publishes decoded readings.

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use vemsrv::{
    bootstrap::{self, Args},
    logging,
    publisher::{LogPublisher, MqttPublisher},
    runtime::{BusMonitor, MonitorSettings},
    shutdown,
    transport::SerialTransport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config =
        bootstrap::load_configuration(&args).context("Failed to load configuration")?;

    // Held for the process lifetime so buffered file logs get flushed
    let _log_guard = logging::init_logging(&config.service.name, &config.logging, !args.no_color)?;

    info!(
        "Starting {} v{}",
        config.service.name,
        env!("CARGO_PKG_VERSION")
    );
    bootstrap::log_configuration(&config);

    // Validation mode: validate and exit
    if args.validate {
        info!("Effective configuration:\n{}", config.to_yaml()?);
        info!("Validation completed successfully");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let signal_task = shutdown::spawn_signal_handler(cancel.clone());

    let transport = SerialTransport::open(&config.serial)
        .with_context(|| format!("Cannot open eBUS adapter on {}", config.serial.port))?;
    let settings = MonitorSettings::from(&config);

    let result = if config.mqtt.enabled {
        let publisher = MqttPublisher::start(&config.mqtt);
        let mut monitor = BusMonitor::new(transport, publisher, settings);
        let result = monitor.run(cancel.clone()).await;
        monitor.into_publisher().shutdown().await;
        result
    } else {
        let mut monitor = BusMonitor::new(transport, LogPublisher, settings);
        monitor.run(cancel.clone()).await
    };

    // Release the signal handler in case the loop ended on its own
    cancel.cancel();
    if let Err(e) = signal_task.await {
        error!("Signal handler task failed: {}", e);
    }

    match result {
        Ok(stats) => {
            info!(
                "{} stopped after {} frames ({} valid)",
                config.service.name, stats.frames, stats.valid
            );
            Ok(())
        },
        Err(e) => {
            error!("{} stopped: {}", config.service.name, e);
            Err(e).context("Bus monitor failed")
        },
    }
}
