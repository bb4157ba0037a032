//! Service configuration
//!
//! Sources, later ones win:
//!
//! ```text
//! defaults -> config/vemsrv.yaml (or --config) -> VEMSRV_* env -> CLI flags
//! ```
//!
//! Environment keys use `__` as the section separator, e.g.
//! `VEMSRV_SERIAL__PORT=/dev/ttyUSB1` or `VEMSRV_MQTT__HOST=broker.lan`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VemSrvError};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/vemsrv.yaml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "VEMSRV_";

/// Upper bound for timeouts and intervals, one day
pub const MAX_DURATION_SECS: u64 = 86_400;

// ============================================================================
// Log level
// ============================================================================

/// Diagnostic level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter())
    }
}

impl FromStr for LogLevel {
    type Err = VemSrvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(VemSrvError::config(format!("Unknown log level: {other}"))),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Service identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

/// Serial bus interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path (e.g. "/dev/ttyUSB0")
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Timeout applied by the serial driver to a single read
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// How long to wait for a complete frame before reporting a quiet bus
    #[serde(default = "default_frame_timeout_secs")]
    pub frame_timeout_secs: u64,
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_secs(self.frame_timeout_secs)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            frame_timeout_secs: default_frame_timeout_secs(),
        }
    }
}

/// MQTT publish sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default = "default_service_name")]
    pub client_id: String,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// 0, 1 or 2
    #[serde(default)]
    pub qos: u8,

    #[serde(default)]
    pub retain: bool,

    /// Request queue size between the client handle and its event loop
    #[serde(default = "default_mqtt_capacity")]
    pub capacity: usize,

    pub username: Option<String>,

    pub password: Option<String>,
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_service_name(),
            keep_alive_secs: default_keep_alive_secs(),
            qos: 0,
            retain: false,
            capacity: default_mqtt_capacity(),
            username: None,
            password: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// Directory for daily log files, file logging is off when absent
    pub dir: Option<PathBuf>,

    /// Console logging
    #[serde(default = "default_true")]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            dir: None,
            console: true,
        }
    }
}

/// Read loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Interval of the statistics log line, 0 disables it
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl RuntimeConfig {
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_service_name() -> String {
    "vemsrv".to_string()
}

fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    2400
}

fn default_read_timeout_ms() -> u64 {
    5000
}

fn default_frame_timeout_secs() -> u64 {
    60
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_mqtt_capacity() -> usize {
    64
}

fn default_stats_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Loading
// ============================================================================

impl AppConfig {
    /// Provider chain: YAML file, then `VEMSRV_` environment
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration without validating it
    ///
    /// An explicitly given file must exist; the default file is optional.
    /// Call [`AppConfig::validate`] once all overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) if !path.exists() => {
                return Err(VemSrvError::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            },
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        Self::figment(&path)
            .extract()
            .map_err(|e| VemSrvError::config(format!("Failed to load configuration: {e}")))
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(VemSrvError::config("serial.port must not be empty"));
        }
        if self.serial.baud_rate == 0 {
            return Err(VemSrvError::config("serial.baud_rate must be greater than 0"));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(VemSrvError::config(
                "serial.read_timeout_ms must be greater than 0",
            ));
        }
        if self.serial.frame_timeout_secs == 0 {
            return Err(VemSrvError::config(
                "serial.frame_timeout_secs must be greater than 0",
            ));
        }
        if self.serial.frame_timeout_secs > MAX_DURATION_SECS {
            return Err(VemSrvError::config(format!(
                "serial.frame_timeout_secs must not exceed {MAX_DURATION_SECS}"
            )));
        }
        if self.runtime.stats_interval_secs > MAX_DURATION_SECS {
            return Err(VemSrvError::config(format!(
                "runtime.stats_interval_secs must not exceed {MAX_DURATION_SECS}"
            )));
        }

        if self.mqtt.qos > 2 {
            return Err(VemSrvError::config(format!(
                "mqtt.qos must be 0, 1 or 2, got {}",
                self.mqtt.qos
            )));
        }
        if self.mqtt.enabled {
            if self.mqtt.host.trim().is_empty() {
                return Err(VemSrvError::config("mqtt.host must not be empty"));
            }
            if self.mqtt.client_id.trim().is_empty() {
                return Err(VemSrvError::config("mqtt.client_id must not be empty"));
            }
            if self.mqtt.keep_alive_secs < 5 {
                return Err(VemSrvError::config(
                    "mqtt.keep_alive_secs must be at least 5",
                ));
            }
            if self.mqtt.capacity == 0 {
                return Err(VemSrvError::config("mqtt.capacity must be greater than 0"));
            }
        }

        Ok(())
    }

    /// Effective configuration as YAML, password masked
    pub fn to_yaml(&self) -> Result<String> {
        let mut masked = self.clone();
        if masked.mqtt.password.is_some() {
            masked.mqtt.password = Some("********".to_string());
        }
        Ok(serde_yaml::to_string(&masked)?)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.service.name, "vemsrv");
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 2400);
        assert_eq!(config.serial.frame_timeout(), Duration::from_secs(60));
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(
            config.runtime.stats_interval(),
            Some(Duration::from_secs(300))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(
            r#"
serial:
  port: /dev/ttyAMA0
mqtt:
  host: broker.lan
  qos: 1
logging:
  level: warn
"#,
        );
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyAMA0");
        assert_eq!(config.serial.baud_rate, 2400);
        assert_eq!(config.mqtt.host, "broker.lan");
        assert_eq!(config.mqtt.qos, 1);
        assert_eq!(config.mqtt.client_id, "vemsrv");
        assert_eq!(config.logging.level, LogLevel::Warning);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/vemsrv.yaml"))).unwrap_err();
        assert!(matches!(err, VemSrvError::ConfigError(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_config("mqtt:\n  qos: 3\n");
        let config = AppConfig::load(Some(file.path())).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mqtt.qos"));

        let mut config = AppConfig::default();
        config.serial.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.mqtt.host = String::new();
        assert!(config.validate().is_err());

        // Host is irrelevant when publishing is off
        config.mqtt.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations_capped_at_one_day() {
        let file = write_config("serial:\n  frame_timeout_secs: 18446744073709551615\n");
        let config = AppConfig::load(Some(file.path())).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("serial.frame_timeout_secs"));

        let mut config = AppConfig::default();
        config.runtime.stats_interval_secs = MAX_DURATION_SECS + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("runtime.stats_interval_secs"));

        config.runtime.stats_interval_secs = MAX_DURATION_SECS;
        config.serial.frame_timeout_secs = MAX_DURATION_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("verbose".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Warning.as_filter(), "warn");
    }

    #[test]
    fn test_yaml_masks_password() {
        let mut config = AppConfig::default();
        config.mqtt.username = Some("vem".to_string());
        config.mqtt.password = Some("secret".to_string());
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("username: vem"));
        assert!(!yaml.contains("secret"));
    }
}
