//! Command identifiers and error codes shared by both ends of the link
//!
//! The identifier space is open: any `u8` is a legal command. The named
//! constants below are the vocabulary the bridge and microcontroller
//! firmwares agree on, grouped by convention into ranges.

use crate::error::{ProtocolError, Result};

/// An 8-bit command identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandId(pub u8);

impl CommandId {
    // System control
    pub const PING: CommandId = CommandId(0x01);
    pub const PONG: CommandId = CommandId(0x02);
    pub const ERROR: CommandId = CommandId(0x03);
    pub const ACK: CommandId = CommandId(0x04);

    // LED
    pub const LED_SET: CommandId = CommandId(0x10);
    pub const LED_BLINK: CommandId = CommandId(0x11);
    pub const LED_PATTERN: CommandId = CommandId(0x12);

    // Sensors
    pub const SENSOR_READ: CommandId = CommandId(0x20);
    pub const SENSOR_DATA: CommandId = CommandId(0x21);
    pub const SENSOR_CONFIG: CommandId = CommandId(0x22);

    // Rotary encoder
    pub const ENCODER_READ: CommandId = CommandId(0x30);
    pub const ENCODER_DATA: CommandId = CommandId(0x31);
    pub const ENCODER_RESET: CommandId = CommandId(0x32);

    // OLED display
    pub const OLED_CLEAR: CommandId = CommandId(0x40);
    pub const OLED_TEXT: CommandId = CommandId(0x41);
    pub const OLED_PIXEL: CommandId = CommandId(0x42);
    pub const OLED_LINE: CommandId = CommandId(0x43);
    pub const OLED_RECT: CommandId = CommandId(0x44);
    pub const OLED_BITMAP: CommandId = CommandId(0x45);

    // Generic typed data
    pub const DATA_UINT8: CommandId = CommandId(0x50);
    pub const DATA_INT16: CommandId = CommandId(0x51);
    pub const DATA_INT32: CommandId = CommandId(0x52);
    pub const DATA_FLOAT: CommandId = CommandId(0x53);
    pub const DATA_STRING: CommandId = CommandId(0x54);
    pub const DATA_ARRAY: CommandId = CommandId(0x55);

    /// Get the raw identifier
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Human-readable name, or `None` for identifiers outside the shared vocabulary
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            CommandId::PING => "PING",
            CommandId::PONG => "PONG",
            CommandId::ERROR => "ERROR",
            CommandId::ACK => "ACK",
            CommandId::LED_SET => "LED_SET",
            CommandId::LED_BLINK => "LED_BLINK",
            CommandId::LED_PATTERN => "LED_PATTERN",
            CommandId::SENSOR_READ => "SENSOR_READ",
            CommandId::SENSOR_DATA => "SENSOR_DATA",
            CommandId::SENSOR_CONFIG => "SENSOR_CONFIG",
            CommandId::ENCODER_READ => "ENCODER_READ",
            CommandId::ENCODER_DATA => "ENCODER_DATA",
            CommandId::ENCODER_RESET => "ENCODER_RESET",
            CommandId::OLED_CLEAR => "OLED_CLEAR",
            CommandId::OLED_TEXT => "OLED_TEXT",
            CommandId::OLED_PIXEL => "OLED_PIXEL",
            CommandId::OLED_LINE => "OLED_LINE",
            CommandId::OLED_RECT => "OLED_RECT",
            CommandId::OLED_BITMAP => "OLED_BITMAP",
            CommandId::DATA_UINT8 => "DATA_UINT8",
            CommandId::DATA_INT16 => "DATA_INT16",
            CommandId::DATA_INT32 => "DATA_INT32",
            CommandId::DATA_FLOAT => "DATA_FLOAT",
            CommandId::DATA_STRING => "DATA_STRING",
            CommandId::DATA_ARRAY => "DATA_ARRAY",
            _ => return None,
        };
        Some(name)
    }

    /// Which conventional range this identifier falls in
    pub fn family(&self) -> CommandFamily {
        match self.0 {
            0x00..=0x0F => CommandFamily::System,
            0x10..=0x1F => CommandFamily::Led,
            0x20..=0x2F => CommandFamily::Sensor,
            0x30..=0x3F => CommandFamily::Encoder,
            0x40..=0x4F => CommandFamily::Display,
            0x50..=0x5F => CommandFamily::Data,
            _ => CommandFamily::User,
        }
    }

    /// PING, PONG, ERROR and ACK
    pub fn is_control(&self) -> bool {
        matches!(
            *self,
            CommandId::PING | CommandId::PONG | CommandId::ERROR | CommandId::ACK
        )
    }

    /// Frames that answer a previous request and must never be answered themselves
    pub fn is_reply(&self) -> bool {
        matches!(*self, CommandId::PONG | CommandId::ERROR | CommandId::ACK)
    }
}

impl From<u8> for CommandId {
    fn from(value: u8) -> Self {
        CommandId(value)
    }
}

impl From<CommandId> for u8 {
    fn from(id: CommandId) -> Self {
        id.0
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({:#04x})", name, self.0),
            None => write!(f, "CMD {:#04x}", self.0),
        }
    }
}

/// Conventional grouping of command identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandFamily {
    /// 0x00-0x0F: ping, pong, ack, error
    System,
    /// 0x10-0x1F
    Led,
    /// 0x20-0x2F
    Sensor,
    /// 0x30-0x3F
    Encoder,
    /// 0x40-0x4F
    Display,
    /// 0x50-0x5F: generic typed data transport
    Data,
    /// Everything else, free for application use
    User,
}

/// Reason code carried in the single payload byte of an ERROR frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ErrorCode {
    /// No error
    Ok = 0x00,
    /// Command identifier not handled by the receiver
    InvalidCommand = 0x01,
    /// Checksum failure reported by an application layer
    InvalidCrc = 0x02,
    /// Operation did not complete in time
    Timeout = 0x03,
    /// Data did not fit in a receiver buffer
    BufferOverflow = 0x04,
    /// Payload was malformed or out of range
    InvalidParam = 0x05,
    /// Receiver is not ready to act on the command
    NotReady = 0x06,
}

impl ErrorCode {
    /// Get the wire value
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(ErrorCode::Ok),
            0x01 => Ok(ErrorCode::InvalidCommand),
            0x02 => Ok(ErrorCode::InvalidCrc),
            0x03 => Ok(ErrorCode::Timeout),
            0x04 => Ok(ErrorCode::BufferOverflow),
            0x05 => Ok(ErrorCode::InvalidParam),
            0x06 => Ok(ErrorCode::NotReady),
            _ => Err(ProtocolError::UnknownErrorCode(value)),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ErrorCode::Ok => "ok",
            ErrorCode::InvalidCommand => "invalid command",
            ErrorCode::InvalidCrc => "invalid CRC",
            ErrorCode::Timeout => "timeout",
            ErrorCode::BufferOverflow => "buffer overflow",
            ErrorCode::InvalidParam => "invalid parameter",
            ErrorCode::NotReady => "not ready",
        };
        f.write_str(text)
    }
}
