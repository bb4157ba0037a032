//! eBUS protocol constants
//!
//! Byte values and size limits of the eBUS line protocol as used by the
//! Vaillant controller family. Offsets refer to the de-escaped (logical) frame.

// ============================================================================
// Line Symbols
// ============================================================================

/// SYN symbol, marks frame boundaries on the wire
pub const SYN: u8 = 0xAA;

/// Escape marker introducing a two-byte line encoding
pub const ESCAPE: u8 = 0xA9;

/// Second byte of the encoding for a literal `0xA9`
pub const ESCAPED_ESCAPE: u8 = 0x00;

/// Second byte of the encoding for a literal `0xAA`
pub const ESCAPED_SYN: u8 = 0x01;

/// Positive acknowledgment
pub const ACK: u8 = 0x00;

/// Broadcast destination address
///
/// Some controller firmware revisions were observed with `0xF8` in decoding
/// paths; `0xFE` is the documented broadcast address and the only value
/// treated as broadcast here.
pub const BROADCAST: u8 = 0xFE;

// ============================================================================
// Frame Layout
// ============================================================================

/// Offset of the source (master) address
pub const OFFSET_SOURCE: usize = 0;

/// Offset of the destination address
pub const OFFSET_DESTINATION: usize = 1;

/// Offset of the primary command byte (command class)
pub const OFFSET_COMMAND: usize = 2;

/// Offset of the master data length byte
pub const OFFSET_DATA_LEN: usize = 4;

/// Offset of the first master data byte
pub const OFFSET_DATA: usize = 5;

/// Maximum number of master data bytes
///
/// The slave length byte is not capped, only checked against the frame size.
pub const MAX_DATA_LEN: usize = 16;

/// Smallest frame that can pass validation
/// Format: QQ(1) + ZZ(1) + PB SB(2) + NN(1) + CRC(1) = 6 bytes
pub const MIN_FRAME_LEN: usize = 6;

/// Master part without data: addresses, command, length and CRC
pub const MASTER_OVERHEAD: usize = 6;

/// Slave part without data: length, CRC and the master's acknowledgment
pub const SLAVE_OVERHEAD: usize = 3;

/// Upper bound on line bytes accumulated before a SYN must appear
///
/// Calculation:
/// - Longest logical frame with a 16 byte response: 6 + 16 + 1 (ACK) + 3 + 16 = 42 bytes
/// - Worst case line encoding doubles every byte: 84 bytes
/// - Buffer limit: 128 bytes
pub const MAX_RAW_FRAME_LEN: usize = 128;

// ============================================================================
// Command Classes
// ============================================================================

/// Vendor extension class (Vaillant)
pub const CLASS_VENDOR: u8 = 0xB5;

/// Vendor sub-command: Get Data Block
pub const VENDOR_GET_DATA_BLOCK: u8 = 0x04;

/// Vendor sub-command: Set Operation Mode
pub const VENDOR_SET_OPERATION_MODE: u8 = 0x05;

/// Vendor sub-command: operational data, room controller to burner control
pub const VENDOR_ROOM_TO_BURNER: u8 = 0x10;

/// Vendor sub-command: operational data, burner control to room controller
pub const VENDOR_BURNER_TO_ROOM: u8 = 0x11;

/// Vendor sub-command: pump commands
pub const VENDOR_PUMP_COMMANDS: u8 = 0x12;

/// Vendor sub-command: broadcast service
pub const VENDOR_BROADCAST_SERVICE: u8 = 0x16;
