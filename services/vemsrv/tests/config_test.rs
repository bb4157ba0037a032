//! Configuration loading tests

use std::io::Write;

use clap::Parser;
use vemsrv::bootstrap::{load_configuration, Args};
use vemsrv::config::LogLevel;
use vemsrv::runtime::MonitorSettings;

fn write_config(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("create temp config");
    file.write_all(yaml.as_bytes()).expect("write temp config");
    file
}

#[test]
fn test_file_and_cli_overrides() {
    let file = write_config(
        r#"
service:
  name: vem-basement
serial:
  port: /dev/ttyUSB0
  frame_timeout_secs: 30
mqtt:
  host: broker.lan
  username: vem
  password: secret
runtime:
  stats_interval_secs: 0
"#,
    );
    let path = file.path().to_string_lossy().to_string();
    let args = Args::parse_from([
        "vemsrv",
        "--config",
        path.as_str(),
        "--port",
        "/dev/ttyUSB3",
        "--log-level",
        "debug",
    ]);

    let config = load_configuration(&args).expect("load config");
    assert_eq!(config.service.name, "vem-basement");
    assert_eq!(config.serial.port, "/dev/ttyUSB3");
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert_eq!(config.mqtt.username.as_deref(), Some("vem"));

    let settings = MonitorSettings::from(&config);
    assert_eq!(settings.frame_timeout.as_secs(), 30);
    assert_eq!(settings.stats_interval, None);
}

#[test]
fn test_dry_run_allows_missing_broker() {
    let file = write_config("mqtt:\n  host: \"\"\n");
    let path = file.path().to_string_lossy().to_string();

    let args = Args::parse_from(["vemsrv", "--config", path.as_str()]);
    assert!(load_configuration(&args).is_err());

    let args = Args::parse_from(["vemsrv", "--config", path.as_str(), "--dry-run"]);
    let config = load_configuration(&args).expect("dry run config");
    assert!(!config.mqtt.enabled);
}
