//! Protocol parsing
//!
//! Extracts addressing, command and payloads from a [`ValidatedFrame`]. Each
//! call produces a fresh, immutable [`Message`]; nothing is carried over
//! between frames.

use std::fmt;

use crate::constants::{
    BROADCAST, MASTER_OVERHEAD, OFFSET_COMMAND, OFFSET_DATA, OFFSET_DESTINATION, OFFSET_SOURCE,
};
use crate::frame::{hex_dump, FrameClass, ValidatedFrame};

/// Destination of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Broadcast,
    Address(u8),
}

impl Destination {
    pub fn from_byte(byte: u8) -> Self {
        if byte == BROADCAST {
            Destination::Broadcast
        } else {
            Destination::Address(byte)
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Destination::Broadcast)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Broadcast => write!(f, "broadcast"),
            Destination::Address(addr) => write!(f, "{addr:02x}"),
        }
    }
}

/// 16-bit command code: primary byte (class) and secondary byte (sub-command)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command(pub u16);

impl Command {
    pub fn new(class: u8, subcommand: u8) -> Self {
        Command(u16::from_be_bytes([class, subcommand]))
    }

    pub fn class(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn subcommand(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn code(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x} 0x{:02x}", self.class(), self.subcommand())
    }
}

/// Parsed view of one bus transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source: u8,
    pub destination: Destination,
    pub command: Command,
    pub master_data: Vec<u8>,
    /// Present if and only if the frame is a master-slave transaction
    pub slave_data: Option<Vec<u8>>,
    pub class: FrameClass,
}

impl Message {
    /// Selector byte (first master data byte), if any
    pub fn selector(&self) -> Option<u8> {
        self.master_data.first().copied()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "src={:02x} dst={} cmd={} data=[{}]",
            self.source,
            self.destination,
            self.command,
            hex_dump(&self.master_data)
        )?;
        if let Some(slave) = &self.slave_data {
            write!(f, " slave=[{}]", hex_dump(slave))?;
        }
        Ok(())
    }
}

/// Parse a validated frame
///
/// Total once validation has passed: every offset used here was bounds-checked
/// by [`crate::frame::validate`].
pub fn parse(frame: &ValidatedFrame) -> Message {
    let bytes = frame.as_bytes();
    let data_len = frame.data_len();

    let command = Command(u16::from_be_bytes([
        bytes[OFFSET_COMMAND],
        bytes[OFFSET_COMMAND + 1],
    ]));
    let master_data = bytes[OFFSET_DATA..OFFSET_DATA + data_len].to_vec();

    // Slave block starts after master part and ACK, data after its length byte
    let slave_data = match (frame.class(), frame.slave_len()) {
        (FrameClass::MasterSlave, Some(slave_len)) => {
            let start = data_len + MASTER_OVERHEAD + 2;
            Some(bytes[start..start + slave_len].to_vec())
        },
        _ => None,
    };

    Message {
        source: bytes[OFFSET_SOURCE],
        destination: Destination::from_byte(bytes[OFFSET_DESTINATION]),
        command,
        master_data,
        slave_data,
        class: frame.class(),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::frame::{validate, RawFrame};

    fn parse_bytes(bytes: &[u8]) -> Message {
        let frame = validate(&RawFrame::new(bytes.to_vec())).unwrap();
        parse(&frame)
    }

    #[test]
    fn test_command_parts() {
        let cmd = Command::new(0xB5, 0x11);
        assert_eq!(cmd.code(), 0xB511);
        assert_eq!(cmd.class(), 0xB5);
        assert_eq!(cmd.subcommand(), 0x11);
        assert_eq!(cmd.to_string(), "0xb5 0x11");
    }

    #[test]
    fn test_parse_broadcast() {
        let msg = parse_bytes(&[0x10, 0xFE, 0xB5, 0x05, 0x02, 0x29, 0x00, 0x2C]);
        assert_eq!(msg.source, 0x10);
        assert_eq!(msg.destination, Destination::Broadcast);
        assert!(msg.destination.is_broadcast());
        assert_eq!(msg.command, Command(0xB505));
        assert_eq!(msg.master_data, vec![0x29, 0x00]);
        assert_eq!(msg.slave_data, None);
        assert_eq!(msg.class, FrameClass::Broadcast);
    }

    #[test]
    fn test_parse_master_master() {
        let msg = parse_bytes(&[0x10, 0x08, 0xB5, 0x12, 0x02, 0x00, 0x64, 0xAE, 0x00]);
        assert_eq!(msg.destination, Destination::Address(0x08));
        assert_eq!(msg.master_data, vec![0x00, 0x64]);
        assert_eq!(msg.slave_data, None);
        assert_eq!(msg.class, FrameClass::MasterMaster);
    }

    #[test]
    fn test_parse_master_slave() {
        let msg = parse_bytes(&[
            0x10, 0x08, 0xB5, 0x11, 0x01, 0x02, 0x8A, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x78,
            0x3F, 0x00,
        ]);
        assert_eq!(msg.command.subcommand(), 0x11);
        assert_eq!(msg.selector(), Some(0x02));
        assert_eq!(msg.slave_data, Some(vec![0x00, 0x00, 0x00, 0x00, 0x78]));
        assert_eq!(msg.class, FrameClass::MasterSlave);
        assert_eq!(
            msg.to_string(),
            "src=10 dst=08 cmd=0xb5 0x11 data=[02] slave=[00:00:00:00:78]"
        );
    }

    #[test]
    fn test_each_parse_is_independent() {
        let slave = parse_bytes(&[
            0x10, 0x08, 0xB5, 0x11, 0x01, 0x02, 0x8A, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x78,
            0x3F, 0x00,
        ]);
        let broadcast = parse_bytes(&[0x10, 0xFE, 0xB5, 0x05, 0x02, 0x29, 0x00, 0x2C]);
        assert!(slave.slave_data.is_some());
        assert!(broadcast.slave_data.is_none());
    }
}
