//! eBUS Error Types
//!
//! Per-frame errors (framing, validation, decoding) are recoverable: the read
//! loop logs them and moves on to the next frame. Only [`TransportError`] is
//! fatal.

use std::fmt;
use thiserror::Error;

/// Result type for voltage-ebus operations
pub type Result<T> = std::result::Result<T, EbusError>;

/// Transport layer faults (device disconnected, read failures)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Device could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Read from the device failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Byte stream ended
    #[error("Connection closed: {0}")]
    Closed(String),
}

/// Line-level framing errors found while reversing the escape encoding
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Escape marker followed by a byte other than 0x00 / 0x01
    #[error("Invalid escape sequence: 0xA9 0x{byte:02X}")]
    InvalidEscape { byte: u8 },

    /// Escape marker as the last byte before SYN
    #[error("Dangling escape marker at end of frame")]
    DanglingEscape,

    /// Too many bytes without a SYN
    #[error("Frame overrun: {len} bytes without SYN")]
    Overrun { len: usize },
}

/// Which half of a transaction a check applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePart {
    Master,
    Slave,
}

impl fmt::Display for FramePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramePart::Master => write!(f, "master"),
            FramePart::Slave => write!(f, "slave"),
        }
    }
}

/// Coarse classification of validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    Length,
    Checksum,
    Ack,
}

/// Structural or integrity failure of a candidate frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Frame too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("Illegal data length value: 0x{0:02X}")]
    IllegalDataLength(u8),

    #[error("Illegal size of broadcast frame: {len} bytes, expected {expected}")]
    BroadcastSize { len: usize, expected: usize },

    #[error("Slave response size mismatch: {len} bytes, expected {expected}")]
    SlaveSize { len: usize, expected: usize },

    #[error("{part} CRC error: calculated 0x{calculated:02X}, received 0x{received:02X}")]
    Checksum {
        part: FramePart,
        calculated: u8,
        received: u8,
    },

    #[error("Negative {part} ACK: 0x{ack:02X}")]
    NegativeAck { part: FramePart, ack: u8 },
}

impl ValidationError {
    /// Map onto the length / checksum / acknowledgment taxonomy
    pub fn kind(&self) -> ValidationKind {
        match self {
            ValidationError::TooShort { .. }
            | ValidationError::IllegalDataLength(_)
            | ValidationError::BroadcastSize { .. }
            | ValidationError::SlaveSize { .. } => ValidationKind::Length,
            ValidationError::Checksum { .. } => ValidationKind::Checksum,
            ValidationError::NegativeAck { .. } => ValidationKind::Ack,
        }
    }
}

/// Command interpretation failures for a frame that passed validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown command class: 0x{class:02X}")]
    UnknownClass { class: u8 },

    #[error("Unknown sub-command: 0x{class:02X} 0x{subcommand:02X} (selector {selector:?})")]
    UnknownSubcommand {
        class: u8,
        subcommand: u8,
        selector: Option<u8>,
    },

    #[error("{field} length mismatch for 0x{command:04X}: got {actual}, expected {expected}")]
    LengthMismatch {
        command: u16,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("No slave data in 0x{command:04X} message")]
    MissingSlaveData { command: u16 },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Any error raised while turning bus bytes into readings
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EbusError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl EbusError {
    /// Only transport faults end the read loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, EbusError::Transport(_))
    }

    /// Short category name used for logging and statistics
    pub fn category(&self) -> &'static str {
        match self {
            EbusError::Transport(_) => "transport",
            EbusError::Framing(_) => "framing",
            EbusError::Validation(e) => match e.kind() {
                ValidationKind::Length => "length",
                ValidationKind::Checksum => "checksum",
                ValidationKind::Ack => "ack",
            },
            EbusError::Decode(e) => match e {
                DecodeError::UnknownClass { .. } => "unknown_class",
                DecodeError::UnknownSubcommand { .. } => "unknown_subcommand",
                DecodeError::LengthMismatch { .. } | DecodeError::MissingSlaveData { .. } => {
                    "decode_length"
                },
                DecodeError::InvalidTimestamp(_) => "decode_value",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_fatal() {
        let transport: EbusError = TransportError::Closed("eof".to_string()).into();
        assert!(transport.is_fatal());

        let framing: EbusError = FramingError::DanglingEscape.into();
        assert!(!framing.is_fatal());

        let decode: EbusError = DecodeError::UnknownClass { class: 0x07 }.into();
        assert!(!decode.is_fatal());
    }

    #[test]
    fn test_validation_categories() {
        let err: EbusError = ValidationError::IllegalDataLength(0x20).into();
        assert_eq!(err.category(), "length");

        let err: EbusError = ValidationError::Checksum {
            part: FramePart::Slave,
            calculated: 0x12,
            received: 0x34,
        }
        .into();
        assert_eq!(err.category(), "checksum");
        assert!(err.to_string().contains("slave CRC error"));

        let err: EbusError = ValidationError::NegativeAck {
            part: FramePart::Master,
            ack: 0xFF,
        }
        .into();
        assert_eq!(err.category(), "ack");
    }
}
