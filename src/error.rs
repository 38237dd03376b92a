//! Error types for the glucose-rust-ble crate.

use std::time::Duration;

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Invalid data was received from the device.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// A codec read needed more bytes than the buffer holds.
    #[error("Buffer underrun: need {needed} bytes at offset {offset}, buffer holds {len}")]
    BufferUnderrun {
        /// Cursor position of the failed read.
        offset: usize,
        /// Number of bytes the read required.
        needed: usize,
        /// Total buffer length.
        len: usize,
    },

    /// A codec write did not fit in the buffer.
    #[error("Buffer overflow: cannot write {needed} bytes at offset {offset}, buffer holds {len}")]
    BufferOverflow {
        /// Cursor position of the failed write.
        offset: usize,
        /// Number of bytes the write required.
        needed: usize,
        /// Total buffer length.
        len: usize,
    },

    /// A record payload is shorter than its structurally required minimum.
    #[error("Malformed {record}: {len} bytes, need at least {minimum}")]
    MalformedRecord {
        /// Kind of record being decoded.
        record: &'static str,
        /// Length of the received payload.
        len: usize,
        /// Minimum length for this record.
        minimum: usize,
    },

    /// A RACP command was issued while another one is still pending.
    #[error("RACP command {pending:#06x} still in progress")]
    CommandInProgress {
        /// Opcode of the command that is awaiting a response.
        pending: u16,
    },

    /// The meter answered a RACP command with something unexpected.
    #[error("Unexpected RACP response: {context}")]
    ProtocolError {
        /// Description of the unexpected response.
        context: String,
    },

    /// No RACP response arrived in time.
    #[error("RACP command {opcode:#06x} timed out after {timeout:?}")]
    Timeout {
        /// The opcode that was sent.
        opcode: u16,
        /// The timeout that elapsed.
        timeout: Duration,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
