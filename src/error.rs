//! Error types for frame encoding and payload access

use std::time::Duration;

use thiserror::Error;

use crate::command::CommandId;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors reported to callers of the protocol API
///
/// Receive-side corruption (bad CRC, oversized length field, stale partial
/// frame) is never reported through this type. The receiver absorbs it and
/// resynchronizes.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Attempted to encode a payload larger than the wire allows
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A payload write did not fit in the remaining capacity
    #[error("payload buffer full: need {needed} bytes, {remaining} remaining")]
    BufferFull { needed: usize, remaining: usize },

    /// A payload read ran past the end of the payload
    #[error("insufficient data: need {needed} bytes, {remaining} remaining")]
    InsufficientData { needed: usize, remaining: usize },

    /// String longer than the one-byte length prefix can describe
    #[error("string too long: {0} bytes (max 255)")]
    StringTooLong(usize),

    /// Caller-provided output buffer cannot hold the decoded value
    #[error("output buffer too small: need {needed} bytes, capacity {capacity}")]
    OutputTooSmall { needed: usize, capacity: usize },

    /// String payload was not valid UTF-8
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    /// Byte does not name a known error code
    #[error("unknown error code: {0:#04x}")]
    UnknownErrorCode(u8),

    /// Buffer handed to the one-shot decoder is not a valid frame
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Frame carried a different command than the caller expected
    #[error("unexpected command: expected {expected}, got {actual}")]
    UnexpectedCommand {
        expected: CommandId,
        actual: CommandId,
    },

    /// No reply arrived before the deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Underlying stream failed
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Create a new InvalidFrame error
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        ProtocolError::InvalidFrame(msg.into())
    }

    /// Create a new BufferFull error
    pub fn buffer_full(needed: usize, remaining: usize) -> Self {
        ProtocolError::BufferFull { needed, remaining }
    }

    /// Create a new InsufficientData error
    pub fn insufficient_data(needed: usize, remaining: usize) -> Self {
        ProtocolError::InsufficientData { needed, remaining }
    }
}
