//! eBUS Monitor Service (vemsrv)
//!
//! Listens to the eBUS of a Vaillant heating controller through a serial
//! adapter, decodes vendor commands with `voltage-ebus` and publishes the
//! resulting readings to MQTT.
//!
//! # Modules
//!
//! - `bootstrap` - command-line arguments and configuration overrides
//! - `config` - YAML / environment configuration
//! - `logging` - tracing subscriber setup
//! - `transport` - serial and mock byte sources
//! - `publisher` - MQTT, log and in-memory sinks
//! - `runtime` - the read loop
//! - `shutdown` - signal handling

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod publisher;
pub mod runtime;
pub mod shutdown;
pub mod transport;

pub use config::AppConfig;
pub use error::{Result, VemSrvError};
pub use runtime::{BusMonitor, MonitorSettings, MonitorStats};
pub use shutdown::wait_for_shutdown;
