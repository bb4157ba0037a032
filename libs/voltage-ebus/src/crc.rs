//! eBUS CRC-8
//!
//! Polynomial 0x9B, MSB first, initial value 0. The checksum is defined over
//! the line encoding, so `0xA9` and `0xAA` are folded in as their two-byte
//! escape sequences.

use crate::escape::encode_byte;

/// CRC-8 generator polynomial
pub const CRC_POLYNOMIAL: u8 = 0x9B;

/// Incremental CRC-8 accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc8 {
    value: u8,
}

impl Crc8 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one logical byte (escaped on the fly)
    pub fn update(&mut self, byte: u8) {
        let (first, second) = encode_byte(byte);
        self.update_line(first);
        if let Some(second) = second {
            self.update_line(second);
        }
    }

    /// Fold one line byte, eight shift/XOR steps
    fn update_line(&mut self, mut byte: u8) {
        let mut crc = self.value;
        for _ in 0..8 {
            let polynomial = if crc & 0x80 != 0 { CRC_POLYNOMIAL } else { 0 };
            crc = (crc & 0x7F) << 1;
            if byte & 0x80 != 0 {
                crc |= 0x01;
            }
            crc ^= polynomial;
            byte <<= 1;
        }
        self.value = crc;
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

/// CRC-8 of a logical byte sequence
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = Crc8::new();
    for &byte in data {
        crc.update(byte);
    }
    crc.value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_empty_data() {
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_crc8_known_vectors() {
        assert_eq!(crc8(&[0x01, 0x02, 0x03]), 0xB8);
        // SetOperationMode broadcast as captured on a live bus
        assert_eq!(crc8(&[0x10, 0xFE, 0xB5, 0x05, 0x02, 0x29, 0x00]), 0x2C);
    }

    #[test]
    fn test_crc8_uses_line_encoding() {
        assert_eq!(crc8(&[0xA9]), 0xED);
        assert_eq!(crc8(&[0xAA]), 0xEC);

        let mut line = Crc8::new();
        line.update_line(0xA9);
        line.update_line(0x01);
        assert_eq!(line.value(), crc8(&[0xAA]));
    }

    #[test]
    fn test_crc8_consistency() {
        let data = [0x10, 0x08, 0xB5, 0x11, 0x01, 0x01];
        assert_eq!(crc8(&data), crc8(&data));
        assert_eq!(crc8(&data), 0x89);
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let data = [0x10, 0xFE, 0xB5, 0x16, 0x03, 0x01, 0xAA, 0x0C];
        let mut crc = Crc8::new();
        for &byte in &data {
            crc.update(byte);
        }
        assert_eq!(crc.value(), crc8(&data));
        assert_eq!(crc.value(), 0x5A);
    }
}
