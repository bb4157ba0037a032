//! Command interpretation
//!
//! Maps `(class, sub-command)` to a decoding rule. Only the vendor extension
//! class `0xB5` is decoded:
//!
//! ```text
//! sub  name                 master len       slave len
//! 04   get data block       1                by selector (0:10 1:9 2:7 9:10 0d:5)
//! 05   set operation mode   any              -
//! 10   room -> burner       9                -
//! 11   burner -> room       1                by selector (1:9 2:5)
//! 12   pump commands        2                -
//! 16   broadcast service    by selector (0:8 1:3)
//! ```
//!
//! Temperatures are "raw / 2" for single bytes and "little-endian u16 / 256"
//! for the outside temperature fields.

use chrono::NaiveDate;
use tracing::debug;

use crate::constants::{
    CLASS_VENDOR, VENDOR_BROADCAST_SERVICE, VENDOR_BURNER_TO_ROOM, VENDOR_GET_DATA_BLOCK,
    VENDOR_PUMP_COMMANDS, VENDOR_ROOM_TO_BURNER, VENDOR_SET_OPERATION_MODE,
};
use crate::error::DecodeError;
use crate::frame::hex_dump;
use crate::message::Message;
use crate::reading::{Metric, Reading, ReadingValue};

/// Decode function of a single rule
pub type DecodeFn = fn(&Message) -> Result<Vec<Reading>, DecodeError>;

/// Expected master data length of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterLength {
    /// Not checked
    Any,
    Fixed(usize),
    /// Keyed by the selector byte (first master data byte)
    BySelector(&'static [(u8, usize)]),
}

/// One entry of the dispatch table
#[derive(Debug, Clone, Copy)]
pub struct CommandRule {
    pub class: u8,
    pub subcommand: u8,
    pub name: &'static str,
    pub master_len: MasterLength,
    pub decode: DecodeFn,
}

const DATA_BLOCK_SLAVE_LEN: &[(u8, usize)] =
    &[(0x00, 10), (0x01, 9), (0x02, 7), (0x09, 10), (0x0d, 5)];
const BURNER_TO_ROOM_SLAVE_LEN: &[(u8, usize)] = &[(0x01, 9), (0x02, 5)];
const BROADCAST_SERVICE_MASTER_LEN: &[(u8, usize)] = &[(0x00, 8), (0x01, 3)];

/// Vendor class 0xB5 commands
pub static VENDOR_RULES: &[CommandRule] = &[
    CommandRule {
        class: CLASS_VENDOR,
        subcommand: VENDOR_GET_DATA_BLOCK,
        name: "get_data_block",
        master_len: MasterLength::Fixed(1),
        decode: decode_get_data_block,
    },
    CommandRule {
        class: CLASS_VENDOR,
        subcommand: VENDOR_SET_OPERATION_MODE,
        name: "set_operation_mode",
        master_len: MasterLength::Any,
        decode: decode_set_operation_mode,
    },
    CommandRule {
        class: CLASS_VENDOR,
        subcommand: VENDOR_ROOM_TO_BURNER,
        name: "room_to_burner",
        master_len: MasterLength::Fixed(9),
        decode: decode_room_to_burner,
    },
    CommandRule {
        class: CLASS_VENDOR,
        subcommand: VENDOR_BURNER_TO_ROOM,
        name: "burner_to_room",
        master_len: MasterLength::Fixed(1),
        decode: decode_burner_to_room,
    },
    CommandRule {
        class: CLASS_VENDOR,
        subcommand: VENDOR_PUMP_COMMANDS,
        name: "pump_commands",
        master_len: MasterLength::Fixed(2),
        decode: decode_pump_commands,
    },
    CommandRule {
        class: CLASS_VENDOR,
        subcommand: VENDOR_BROADCAST_SERVICE,
        name: "broadcast_service",
        master_len: MasterLength::BySelector(BROADCAST_SERVICE_MASTER_LEN),
        decode: decode_broadcast_service,
    },
];

/// Table-driven command interpreter
///
/// Stateless; every call works only on the message it is given.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter {
    rules: &'static [CommandRule],
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(VENDOR_RULES)
    }
}

impl Interpreter {
    pub fn new(rules: &'static [CommandRule]) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'static [CommandRule] {
        self.rules
    }

    /// Find the rule for a message, checking class and sub-command
    pub fn lookup(&self, message: &Message) -> Result<&'static CommandRule, DecodeError> {
        let class = message.command.class();
        let subcommand = message.command.subcommand();

        if !self.rules.iter().any(|rule| rule.class == class) {
            return Err(DecodeError::UnknownClass { class });
        }

        self.rules
            .iter()
            .find(|rule| rule.class == class && rule.subcommand == subcommand)
            .ok_or(DecodeError::UnknownSubcommand {
                class,
                subcommand,
                selector: None,
            })
    }

    /// Turn a message into zero or more readings
    pub fn interpret(&self, message: &Message) -> Result<Vec<Reading>, DecodeError> {
        let rule = self.lookup(message)?;
        check_master_len(rule, message)?;

        let readings = (rule.decode)(message)?;
        debug!(
            command = %message.command,
            rule = rule.name,
            readings = readings.len(),
            "Command decoded"
        );
        Ok(readings)
    }
}

fn check_master_len(rule: &CommandRule, message: &Message) -> Result<(), DecodeError> {
    let actual = message.master_data.len();
    let expected = match rule.master_len {
        MasterLength::Any => return Ok(()),
        MasterLength::Fixed(n) => n,
        MasterLength::BySelector(table) => match message.selector() {
            Some(selector) => selector_len(table, message, selector)?,
            // No selector byte at all
            None => 1,
        },
    };

    if actual != expected {
        return Err(DecodeError::LengthMismatch {
            command: message.command.code(),
            field: "master data",
            expected,
            actual,
        });
    }
    Ok(())
}

fn selector_len(
    table: &[(u8, usize)],
    message: &Message,
    selector: u8,
) -> Result<usize, DecodeError> {
    table
        .iter()
        .find(|(key, _)| *key == selector)
        .map(|(_, len)| *len)
        .ok_or(DecodeError::UnknownSubcommand {
            class: message.command.class(),
            subcommand: message.command.subcommand(),
            selector: Some(selector),
        })
}

/// Slave data of a message, checked against a per-selector length table
fn slave_data<'a>(
    message: &'a Message,
    table: &[(u8, usize)],
) -> Result<(u8, &'a [u8]), DecodeError> {
    let command = message.command.code();
    let selector = message.selector().ok_or(DecodeError::LengthMismatch {
        command,
        field: "master data",
        expected: 1,
        actual: 0,
    })?;
    let expected = selector_len(table, message, selector)?;

    let slave = message
        .slave_data
        .as_deref()
        .ok_or(DecodeError::MissingSlaveData { command })?;

    if slave.len() != expected {
        return Err(DecodeError::LengthMismatch {
            command,
            field: "slave data",
            expected,
            actual: slave.len(),
        });
    }
    Ok((selector, slave))
}

// ============================================================================
// Value conversions
// ============================================================================

/// Single-byte temperature, half degree resolution
#[inline]
fn half_degrees(raw: u8) -> f64 {
    f64::from(raw) / 2.0
}

/// Little-endian 16-bit temperature, 1/256 degree resolution
#[inline]
fn le16_temp(lo: u8, hi: u8) -> f64 {
    f64::from(u16::from_le_bytes([lo, hi])) / 256.0
}

/// Packed BCD byte to its decimal value
fn bcd(byte: u8, field: &str) -> Result<u32, DecodeError> {
    let hi = byte >> 4;
    let lo = byte & 0x0F;
    if hi > 9 || lo > 9 {
        return Err(DecodeError::InvalidTimestamp(format!(
            "{field} is not BCD: 0x{byte:02X}"
        )));
    }
    Ok(u32::from(hi) * 10 + u32::from(lo))
}

// ============================================================================
// Decode functions
// ============================================================================

fn decode_get_data_block(message: &Message) -> Result<Vec<Reading>, DecodeError> {
    let (selector, slave) = slave_data(message, DATA_BLOCK_SLAVE_LEN)?;

    if selector != 0x00 {
        debug!(
            selector,
            slave = %hex_dump(slave),
            "Data block not decoded"
        );
        return Ok(Vec::new());
    }

    // Bytes 0..8 carry a burner-side clock that does not track real time
    debug!(clock = %hex_dump(&slave[..8]), "Burner clock");
    Ok(vec![Reading::number(
        Metric::OutsideTemp,
        le16_temp(slave[8], slave[9]),
        message.command,
    )])
}

fn decode_set_operation_mode(message: &Message) -> Result<Vec<Reading>, DecodeError> {
    debug!(data = %hex_dump(&message.master_data), "Set operation mode");
    Ok(Vec::new())
}

fn decode_room_to_burner(message: &Message) -> Result<Vec<Reading>, DecodeError> {
    let data = &message.master_data;
    let flags = data[6];
    Ok(vec![
        Reading::number(Metric::HeatingSetpoint, half_degrees(data[2]), message.command),
        Reading::number(Metric::WaterSetpoint, half_degrees(data[3]), message.command),
        Reading::flag(Metric::HeatingRequested, flags & 0x01 == 0, message.command),
        Reading::flag(Metric::WaterRequested, flags & 0x04 == 0, message.command),
    ])
}

fn decode_burner_to_room(message: &Message) -> Result<Vec<Reading>, DecodeError> {
    let (selector, slave) = slave_data(message, BURNER_TO_ROOM_SLAVE_LEN)?;
    let command = message.command;

    match selector {
        0x01 => {
            let flags = slave[6];
            Ok(vec![
                Reading::number(Metric::LeadWaterTemp, half_degrees(slave[0]), command),
                Reading::number(Metric::ReturnWaterTemp, half_degrees(slave[1]), command),
                Reading::number(Metric::OutsideTemp, le16_temp(slave[2], slave[3]), command),
                Reading::number(Metric::WaterTemp, half_degrees(slave[4]), command),
                Reading::number(Metric::StorageTemp, half_degrees(slave[5]), command),
                Reading::flag(Metric::HeatingEnabled, flags & 0x01 != 0, command),
                Reading::flag(Metric::WaterEnabled, flags & 0x02 != 0, command),
            ])
        },
        _ => Ok(vec![Reading::number(
            Metric::WaterTargetTemp,
            half_degrees(slave[4]),
            command,
        )]),
    }
}

fn decode_pump_commands(message: &Message) -> Result<Vec<Reading>, DecodeError> {
    debug!(data = %hex_dump(&message.master_data), "Pump command");
    Ok(Vec::new())
}

fn decode_broadcast_service(message: &Message) -> Result<Vec<Reading>, DecodeError> {
    let data = &message.master_data;
    match data[0] {
        0x00 => {
            let second = bcd(data[1], "second")?;
            let minute = bcd(data[2], "minute")?;
            let hour = bcd(data[3], "hour")?;
            let day = bcd(data[4], "day")?;
            let month = bcd(data[5], "month")?;
            let weekday = bcd(data[6], "weekday")?;
            let year = 2000 + bcd(data[7], "year")?;

            let timestamp = i32::try_from(year)
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
                .and_then(|date| date.and_hms_opt(hour, minute, second))
                .ok_or_else(|| {
                    DecodeError::InvalidTimestamp(format!(
                        "{day:02}.{month:02}.{year} {hour:02}:{minute:02}:{second:02}"
                    ))
                })?;

            debug!(weekday, "Broadcast date/time");
            Ok(vec![Reading {
                metric: Metric::Timestamp,
                value: ReadingValue::Timestamp(timestamp),
                command: message.command,
            }])
        },
        _ => Ok(vec![Reading::number(
            Metric::BroadcastOutsideTemp,
            le16_temp(data[1], data[2]),
            message.command,
        )]),
    }
}
