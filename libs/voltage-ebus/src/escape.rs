//! Line-level escaping
//!
//! `0xAA` (SYN) terminates frames and `0xA9` introduces escape sequences, so
//! both values are sent as two bytes whenever they occur inside a frame:
//!
//! ```text
//! 0xA9  <->  0xA9 0x00
//! 0xAA  <->  0xA9 0x01
//! ```

use crate::constants::{ESCAPE, ESCAPED_ESCAPE, ESCAPED_SYN, SYN};
use crate::error::FramingError;

/// Line encoding of a single logical byte
///
/// Returns the first byte and, for `0xA9` / `0xAA`, the second one.
#[inline]
pub fn encode_byte(byte: u8) -> (u8, Option<u8>) {
    match byte {
        ESCAPE => (ESCAPE, Some(ESCAPED_ESCAPE)),
        SYN => (ESCAPE, Some(ESCAPED_SYN)),
        other => (other, None),
    }
}

/// Apply line escaping to a logical byte sequence
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 4);
    for &byte in data {
        let (first, second) = encode_byte(byte);
        out.push(first);
        if let Some(second) = second {
            out.push(second);
        }
    }
    out
}

/// Reverse line escaping
///
/// Fails on an escape marker that is followed by anything other than
/// `0x00` / `0x01`, or that ends the sequence.
pub fn unescape(line: &[u8]) -> Result<Vec<u8>, FramingError> {
    let mut out = Vec::with_capacity(line.len());
    let mut bytes = line.iter().copied();

    while let Some(byte) = bytes.next() {
        if byte != ESCAPE {
            out.push(byte);
            continue;
        }
        match bytes.next() {
            Some(ESCAPED_ESCAPE) => out.push(ESCAPE),
            Some(ESCAPED_SYN) => out.push(SYN),
            Some(other) => return Err(FramingError::InvalidEscape { byte: other }),
            None => return Err(FramingError::DanglingEscape),
        }
    }

    Ok(out)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_plain_bytes_pass_through() {
        let data = [0x10, 0xFE, 0xB5, 0x16, 0x03];
        assert_eq!(escape(&data), data.to_vec());
        assert_eq!(unescape(&data).unwrap(), data.to_vec());
    }

    #[test]
    fn test_escape_reserved_values() {
        assert_eq!(escape(&[0xA9]), vec![0xA9, 0x00]);
        assert_eq!(escape(&[0xAA]), vec![0xA9, 0x01]);
        assert_eq!(
            escape(&[0x01, 0xAA, 0xA9, 0x02]),
            vec![0x01, 0xA9, 0x01, 0xA9, 0x00, 0x02]
        );
    }

    #[test]
    fn test_unescape_reverses_escape() {
        let samples: [&[u8]; 5] = [
            &[],
            &[0xA9],
            &[0xAA, 0xAA],
            &[0xA9, 0x00, 0x01, 0xAA],
            &[0x10, 0xFE, 0xB5, 0x16, 0x03, 0x01, 0xAA, 0x0C, 0x5A],
        ];
        for sample in samples {
            assert_eq!(unescape(&escape(sample)).unwrap(), sample.to_vec());
        }

        // Every byte value, including both reserved ones
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(unescape(&escape(&all)).unwrap(), all);
    }

    #[test]
    fn test_escaped_output_never_contains_syn() {
        let all: Vec<u8> = (0..=255).collect();
        assert!(!escape(&all).contains(&SYN));
    }

    #[test]
    fn test_invalid_escape_sequence() {
        assert_eq!(
            unescape(&[0x10, 0xA9, 0x05]),
            Err(FramingError::InvalidEscape { byte: 0x05 })
        );
    }

    #[test]
    fn test_dangling_escape() {
        assert_eq!(
            unescape(&[0x10, 0x20, 0xA9]),
            Err(FramingError::DanglingEscape)
        );
    }
}
