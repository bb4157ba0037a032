//! VoltageEMS eBUS Decoding
//!
//! Turns the raw byte stream of an eBUS heating controller into typed
//! telemetry readings.
//!
//! # Pipeline
//!
//! ```text
//! ByteSource -> FrameReader -> validate -> parse -> Interpreter -> Reading
//!               (SYN, A9 xx)   (len/CRC/ACK) (Message)  (0xB5 table)
//! ```
//!
//! Every stage after the reader is a pure function over its input. Errors are
//! per frame and recoverable except [`TransportError`].
//!
//! # Example
//!
//! ```
//! use voltage_ebus::{decode_frame, Interpreter, RawFrame};
//!
//! let frame = RawFrame::new(vec![
//!     0x10, 0xFE, 0xB5, 0x16, 0x08, 0x00, 0x30, 0x15, 0x14, 0x05, 0x06, 0x02, 0x21, 0xA1,
//! ]);
//! let decoded = decode_frame(&frame, &Interpreter::default()).unwrap();
//! assert_eq!(decoded.readings[0].value.to_payload(), "05.06.2021 14:15:30");
//! ```

pub mod constants;
pub mod crc;
pub mod error;
pub mod escape;
pub mod frame;
pub mod interpreter;
pub mod message;
pub mod reader;
pub mod reading;

pub use crc::{crc8, Crc8};
pub use error::{
    DecodeError, EbusError, FramePart, FramingError, Result, TransportError, ValidationError,
    ValidationKind,
};
pub use escape::{escape, unescape};
pub use frame::{hex_dump, validate, FrameClass, RawFrame, ValidatedFrame};
pub use interpreter::{CommandRule, Interpreter, MasterLength};
pub use message::{parse, Command, Destination, Message};
pub use reader::{ByteSource, FrameReader, ReaderStats};
pub use reading::{Metric, Reading, ReadingValue};

/// Result of running one frame through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub message: Message,
    pub readings: Vec<Reading>,
}

/// Validate, parse and interpret a single frame
pub fn decode_frame(raw: &RawFrame, interpreter: &Interpreter) -> Result<Decoded> {
    let frame = validate(raw)?;
    let message = parse(&frame);
    let readings = interpreter.interpret(&message)?;
    Ok(Decoded { message, readings })
}
