//! # Serial Frame Protocol
//!
//! A CRC-checked binary framing protocol for moving structured commands over
//! a noisy serial link, typically between a Wi-Fi bridge and a
//! microcontroller.
//!
//! Every frame on the wire looks like
//! `[0xAA][command][len_hi][len_lo][payload...][crc_hi][crc_lo]` with a
//! CRC-16/CCITT over command, length and payload. This library provides:
//!
//! - Frame encoding, validation and one-shot decoding
//! - Typed big-endian payload builder and reader over fixed buffers
//! - A byte-at-a-time receiver that resynchronizes after noise, corruption
//!   and stalled senders
//! - The shared command vocabulary, dispatch table and ACK/ERROR/PONG
//!   reply conventions
//! - A stream endpoint for cooperative poll loops
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization support
//!
//! ## Example
//!
//! ```
//! use serial_frame_protocol::{encode_frame, CommandId, Receiver};
//!
//! let wire = encode_frame(CommandId::LED_BLINK, &[0x01, 0xF4])?;
//! assert_eq!(wire, [0xAA, 0x11, 0x00, 0x02, 0x01, 0xF4, 0x4D, 0xCD]);
//!
//! let mut rx = Receiver::new();
//! let frames = rx.feed(&wire);
//! assert_eq!(frames[0].command, CommandId::LED_BLINK);
//! assert_eq!(frames[0].payload(), &[0x01, 0xF4]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clock;
pub mod command;
pub mod crc;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod message;
pub mod payload;
pub mod receiver;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{CommandFamily, CommandId, ErrorCode};
pub use dispatch::{Dispatcher, Reply};
pub use endpoint::Endpoint;
pub use error::{ProtocolError, Result};
pub use frame::{decode_frame, encode_frame, encode_frame_into, Frame};
pub use message::Message;
pub use payload::{PayloadBuilder, PayloadReader};
pub use receiver::{FrameView, Receiver, ReceiverBuilder, ReceiverStats, RxState};

/// Wire-level constants shared by every peer
pub mod wire {
    /// Start-of-frame marker
    pub const START_BYTE: u8 = 0xAA;

    /// Maximum payload length in bytes
    pub const MAX_PAYLOAD: usize = 1024;

    /// Start marker + command + two length bytes
    pub const HEADER_SIZE: usize = 4;

    /// Two CRC bytes
    pub const FOOTER_SIZE: usize = 2;

    /// Size of a zero-payload frame
    pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + FOOTER_SIZE;

    /// Size of a full-payload frame
    pub const MAX_FRAME_SIZE: usize = MIN_FRAME_SIZE + MAX_PAYLOAD;

    /// Partial frames older than this are abandoned
    pub const DEFAULT_TIMEOUT_MS: u64 = 100;
}
