//! Byte sources for the frame reader
//!
//! - [`SerialTransport`]: the eBUS adapter on a serial device
//! - [`MockTransport`]: scripted bytes for tests and offline replay

pub mod mock;
pub mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use voltage_ebus::ByteSource;
