//! Frame validation
//!
//! Checks a de-escaped candidate frame for structural well-formedness and CRC
//! integrity, and classifies it by transaction type.
//!
//! ```text
//! master part:  QQ ZZ PB SB NN D1..Dn CRC
//! broadcast:    <master part>
//! master-master:<master part> ACK
//! master-slave: <master part> ACK NN D1..Dn CRC ACK
//! ```
//!
//! Checks run in a fixed order and stop at the first failure.

use crate::constants::{
    ACK, BROADCAST, MASTER_OVERHEAD, MAX_DATA_LEN, MIN_FRAME_LEN, OFFSET_DATA_LEN,
    OFFSET_DESTINATION, SLAVE_OVERHEAD,
};
use crate::crc::crc8;
use crate::error::{FramePart, ValidationError};

/// Render bytes as a colon-separated hex dump (`10:fe:b5`)
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Bytes received between two SYN symbols, escape sequences reversed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Vec<u8>,
}

impl RawFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn hex_dump(&self) -> String {
        hex_dump(&self.bytes)
    }
}

impl From<Vec<u8>> for RawFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Transaction type of a valid frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameClass {
    /// Sent to the broadcast address, no acknowledgment
    Broadcast,
    /// Acknowledged by the addressed station, no response data
    MasterMaster,
    /// Acknowledged and answered with a slave response block
    MasterSlave,
}

/// A frame that passed every length, CRC and acknowledgment check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFrame {
    bytes: Vec<u8>,
    class: FrameClass,
    data_len: usize,
    slave_len: Option<usize>,
}

impl ValidatedFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn class(&self) -> FrameClass {
        self.class
    }

    /// Number of master data bytes
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Number of slave data bytes, present for master-slave frames only
    pub fn slave_len(&self) -> Option<usize> {
        self.slave_len
    }

    pub fn hex_dump(&self) -> String {
        hex_dump(&self.bytes)
    }
}

/// Validate a candidate frame
pub fn validate(raw: &RawFrame) -> Result<ValidatedFrame, ValidationError> {
    let data = raw.as_bytes();
    let len = data.len();

    if len < MIN_FRAME_LEN {
        return Err(ValidationError::TooShort {
            len,
            min: MIN_FRAME_LEN,
        });
    }

    let data_len = usize::from(data[OFFSET_DATA_LEN]);
    if data_len > MAX_DATA_LEN {
        return Err(ValidationError::IllegalDataLength(data[OFFSET_DATA_LEN]));
    }

    let master_len = data_len + MASTER_OVERHEAD;
    if len < master_len {
        return Err(ValidationError::TooShort {
            len,
            min: master_len,
        });
    }

    // CRC covers everything up to and including the last data byte
    let calculated = crc8(&data[..master_len - 1]);
    let received = data[master_len - 1];
    if calculated != received {
        return Err(ValidationError::Checksum {
            part: FramePart::Master,
            calculated,
            received,
        });
    }

    if data[OFFSET_DESTINATION] == BROADCAST {
        if len != master_len {
            return Err(ValidationError::BroadcastSize {
                len,
                expected: master_len,
            });
        }
        return Ok(ValidatedFrame {
            bytes: data.to_vec(),
            class: FrameClass::Broadcast,
            data_len,
            slave_len: None,
        });
    }

    // Addressed frames carry the receiver's acknowledgment
    if len < master_len + 1 {
        return Err(ValidationError::TooShort {
            len,
            min: master_len + 1,
        });
    }
    let ack = data[master_len];
    if ack != ACK {
        return Err(ValidationError::NegativeAck {
            part: FramePart::Master,
            ack,
        });
    }

    if len == master_len + 1 {
        return Ok(ValidatedFrame {
            bytes: data.to_vec(),
            class: FrameClass::MasterMaster,
            data_len,
            slave_len: None,
        });
    }

    let slave_len = validate_slave_part(&data[master_len + 1..], master_len + 1)?;

    Ok(ValidatedFrame {
        bytes: data.to_vec(),
        class: FrameClass::MasterSlave,
        data_len,
        slave_len: Some(slave_len),
    })
}

/// Check the slave response block: NN D1..Dn CRC ACK
///
/// `offset` is the position of the block inside the whole frame, used only to
/// report the expected total size.
fn validate_slave_part(slave: &[u8], offset: usize) -> Result<usize, ValidationError> {
    // Only the master part is capped at MAX_DATA_LEN
    let slave_len = usize::from(slave[0]);
    if slave.len() != slave_len + SLAVE_OVERHEAD {
        return Err(ValidationError::SlaveSize {
            len: offset + slave.len(),
            expected: offset + slave_len + SLAVE_OVERHEAD,
        });
    }

    let calculated = crc8(&slave[..=slave_len]);
    let received = slave[slave_len + 1];
    if calculated != received {
        return Err(ValidationError::Checksum {
            part: FramePart::Slave,
            calculated,
            received,
        });
    }

    let ack = slave[slave_len + 2];
    if ack != ACK {
        return Err(ValidationError::NegativeAck {
            part: FramePart::Slave,
            ack,
        });
    }

    Ok(slave_len)
}
