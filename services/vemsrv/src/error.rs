//! Error handling for the eBUS monitor service

use thiserror::Error;
use voltage_ebus::{EbusError, TransportError};

/// eBUS monitor service error type
#[derive(Error, Debug, Clone)]
pub enum VemSrvError {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Serial device errors, fatal to the read loop
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Publish sink errors
    #[error("Publish error: {0}")]
    PublishError(String),

    /// Frame decoding errors surfaced outside the read loop
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

/// Result type alias for the eBUS monitor service
pub type Result<T> = std::result::Result<T, VemSrvError>;

impl VemSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        VemSrvError::ConfigError(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        VemSrvError::IoError(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        VemSrvError::PublishError(msg.into())
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<std::io::Error> for VemSrvError {
    fn from(err: std::io::Error) -> Self {
        VemSrvError::IoError(err.to_string())
    }
}

impl From<serde_yaml::Error> for VemSrvError {
    fn from(err: serde_yaml::Error) -> Self {
        VemSrvError::ConfigError(format!("YAML: {err}"))
    }
}

impl From<figment::Error> for VemSrvError {
    fn from(err: figment::Error) -> Self {
        VemSrvError::ConfigError(err.to_string())
    }
}

impl From<TransportError> for VemSrvError {
    fn from(err: TransportError) -> Self {
        VemSrvError::TransportError(err.to_string())
    }
}

impl From<EbusError> for VemSrvError {
    fn from(err: EbusError) -> Self {
        match err {
            EbusError::Transport(e) => e.into(),
            other => VemSrvError::ProtocolError(other.to_string()),
        }
    }
}

impl From<rumqttc::ClientError> for VemSrvError {
    fn from(err: rumqttc::ClientError) -> Self {
        VemSrvError::PublishError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltage_ebus::FramingError;

    #[test]
    fn test_transport_fault_maps_to_transport() {
        let err: VemSrvError = EbusError::from(TransportError::Closed("eof".into())).into();
        assert!(matches!(err, VemSrvError::TransportError(_)));
        assert_eq!(err.to_string(), "Transport error: Connection closed: eof");
    }

    #[test]
    fn test_frame_errors_map_to_protocol() {
        let err: VemSrvError = EbusError::from(FramingError::DanglingEscape).into();
        assert!(matches!(err, VemSrvError::ProtocolError(_)));
    }
}
