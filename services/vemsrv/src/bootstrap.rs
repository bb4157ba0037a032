//! Service Bootstrap
//!
//! Command-line arguments and their application on top of the loaded
//! configuration.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use crate::config::{AppConfig, LogLevel};
use crate::error::Result;

/// Command-line arguments for vemsrv
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "vemsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "eBUS heating controller monitor",
    long_about = None
)]
pub struct Args {
    /// Configuration file (default: config/vemsrv.yaml, optional)
    #[arg(short = 'c', long, env = "VEMSRV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Serial device, overrides serial.port
    #[arg(short = 'p', long)]
    pub port: Option<String>,

    /// Log readings instead of publishing them to MQTT
    #[arg(long)]
    pub dry_run: bool,

    /// Validation mode - only validate configuration without starting service
    #[arg(long)]
    pub validate: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// Apply CLI overrides to a loaded configuration and validate the result
    pub fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(level) = &self.log_level {
            config.logging.level = level.parse::<LogLevel>()?;
        }
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if self.dry_run {
            config.mqtt.enabled = false;
        }
        config.validate()
    }
}

/// Load configuration with CLI overrides applied
pub fn load_configuration(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config)?;
    Ok(config)
}

/// Log a summary of the effective configuration
pub fn log_configuration(config: &AppConfig) {
    info!("Service: {}", config.service.name);
    info!(
        "Serial: {} @ {} baud, frame timeout {}s",
        config.serial.port, config.serial.baud_rate, config.serial.frame_timeout_secs
    );
    if config.mqtt.enabled {
        info!(
            "MQTT: {}:{} (client id {}, qos {}, retain {})",
            config.mqtt.host,
            config.mqtt.port,
            config.mqtt.client_id,
            config.mqtt.qos,
            config.mqtt.retain
        );
    } else {
        info!("MQTT: disabled, readings are logged only");
    }
}
