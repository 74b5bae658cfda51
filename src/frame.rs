//! Frame codec: wire encoding, checksum and validation
//!
//! Wire format:
//! ```text
//! ┌────────┬─────────┬────────────┬───────────────┬────────────┐
//! │ 0xAA   │ Command │ Length     │ Payload       │ CRC-16     │
//! │ (1B)   │ (1B)    │ (2B BE)    │ (Length B)    │ (2B BE)    │
//! └────────┴─────────┴────────────┴───────────────┴────────────┘
//! ```
//! The CRC covers command, both length bytes and the payload. It never
//! covers the start marker or itself.

use crate::command::CommandId;
use crate::crc::Crc16;
use crate::error::{ProtocolError, Result};
use crate::wire::{FOOTER_SIZE, HEADER_SIZE, MAX_PAYLOAD, MIN_FRAME_SIZE, START_BYTE};

/// One complete, validated unit of the protocol
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawFrame"))]
pub struct Frame {
    /// Semantic meaning of the payload
    pub command: CommandId,
    /// Payload bytes, at most [`MAX_PAYLOAD`]
    payload: Vec<u8>,
}

impl Frame {
    /// Create a frame, rejecting oversized payloads
    pub fn new(command: impl Into<CommandId>, payload: impl Into<Vec<u8>>) -> Result<Self> {
        let payload = payload.into();
        check_payload_len(payload.len())?;
        Ok(Frame {
            command: command.into(),
            payload,
        })
    }

    /// Build from parts already bounded by the caller
    pub(crate) fn from_parts(command: CommandId, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Frame { command, payload }
    }

    /// Create a frame with no payload
    pub fn empty(command: impl Into<CommandId>) -> Self {
        Frame {
            command: command.into(),
            payload: Vec::new(),
        }
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame and return its payload
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Payload length as carried in the length field
    pub fn len(&self) -> u16 {
        self.payload.len() as u16
    }

    /// True for zero-payload frames such as PING, PONG and ACK
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Checksum this frame carries on the wire
    pub fn crc(&self) -> u16 {
        frame_crc(self.command, &self.payload)
    }

    /// Total wire size (marker + header + payload + CRC)
    pub fn wire_size(&self) -> usize {
        MIN_FRAME_SIZE + self.payload.len()
    }

    /// Serialize to wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_size());
        write_frame(self.command, &self.payload, &mut out);
        out
    }
}

/// Unchecked serde shape of [`Frame`]
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawFrame {
    command: CommandId,
    payload: Vec<u8>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawFrame> for Frame {
    type Error = ProtocolError;

    fn try_from(raw: RawFrame) -> Result<Self> {
        Frame::new(raw.command, raw.payload)
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Frame({}, {} bytes)", self.command, self.payload.len())
    }
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            size: len,
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

fn write_frame(command: CommandId, payload: &[u8], dst: &mut Vec<u8>) {
    let length = payload.len() as u16;
    let crc = frame_crc(command, payload);
    dst.push(START_BYTE);
    dst.push(command.value());
    dst.extend_from_slice(&length.to_be_bytes());
    dst.extend_from_slice(payload);
    dst.extend_from_slice(&crc.to_be_bytes());
}

/// Checksum over `command ∥ length (BE) ∥ payload`
///
/// The length is taken from `payload.len()`; callers must have bounded it to
/// [`MAX_PAYLOAD`] already.
pub fn frame_crc(command: CommandId, payload: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update_byte(command.value());
    crc.update(&(payload.len() as u16).to_be_bytes());
    crc.update(payload);
    crc.finish()
}

/// Recompute the checksum for received fields and compare
///
/// `length` is the value read from the wire; a mismatch with the payload
/// slice is treated as corruption.
pub fn validate(command: CommandId, length: u16, payload: &[u8], received_crc: u16) -> bool {
    if length as usize != payload.len() {
        return false;
    }
    frame_crc(command, payload) == received_crc
}

/// Encode `(command, payload)` into a freshly allocated wire buffer
///
/// Fails with [`ProtocolError::PayloadTooLarge`] for payloads over
/// [`MAX_PAYLOAD`] bytes; nothing is produced in that case.
pub fn encode_frame(command: impl Into<CommandId>, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_frame_into(command, payload, &mut out)?;
    Ok(out)
}

/// Append an encoded frame to `dst`
///
/// `dst` is left untouched on error.
pub fn encode_frame_into(
    command: impl Into<CommandId>,
    payload: &[u8],
    dst: &mut Vec<u8>,
) -> Result<()> {
    check_payload_len(payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len() + FOOTER_SIZE);
    write_frame(command.into(), payload, dst);
    Ok(())
}

/// Decode a buffer holding exactly one frame
///
/// Stream receivers should use [`crate::Receiver`] instead, which tolerates
/// noise and partial delivery. This function is for callers that already
/// hold one frame's bytes and want a hard answer.
pub fn decode_frame(data: &[u8]) -> Result<Frame> {
    if data.len() < MIN_FRAME_SIZE {
        return Err(ProtocolError::invalid_frame(format!(
            "expected at least {} bytes, got {}",
            MIN_FRAME_SIZE,
            data.len()
        )));
    }
    if data[0] != START_BYTE {
        return Err(ProtocolError::invalid_frame(format!(
            "bad start byte {:#04x}",
            data[0]
        )));
    }

    let command = CommandId(data[1]);
    let length = u16::from_be_bytes([data[2], data[3]]);
    if length as usize > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            size: length as usize,
            max: MAX_PAYLOAD,
        });
    }

    let total = MIN_FRAME_SIZE + length as usize;
    if data.len() != total {
        return Err(ProtocolError::invalid_frame(format!(
            "length field says {} bytes on the wire, buffer holds {}",
            total,
            data.len()
        )));
    }

    let payload = &data[HEADER_SIZE..HEADER_SIZE + length as usize];
    let received_crc = u16::from_be_bytes([data[total - 2], data[total - 1]]);
    if !validate(command, length, payload, received_crc) {
        return Err(ProtocolError::invalid_frame(format!(
            "CRC mismatch: received {:#06x}, computed {:#06x}",
            received_crc,
            frame_crc(command, payload)
        )));
    }

    Ok(Frame::from_parts(command, payload.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_vector() -> Result<()> {
        let bytes = encode_frame(CommandId(0x11), &[0x01, 0xF4])?;
        assert_eq!(bytes, vec![0xAA, 0x11, 0x00, 0x02, 0x01, 0xF4, 0x4D, 0xCD]);
        Ok(())
    }

    #[test]
    fn test_encode_is_deterministic() -> Result<()> {
        let payload = b"deterministic";
        assert_eq!(
            encode_frame(CommandId::DATA_STRING, payload)?,
            encode_frame(CommandId::DATA_STRING, payload)?
        );
        Ok(())
    }

    #[test]
    fn test_empty_payload_frame() -> Result<()> {
        let bytes = encode_frame(CommandId::PING, &[])?;
        assert_eq!(bytes.len(), MIN_FRAME_SIZE);
        assert_eq!(&bytes[..4], &[0xAA, 0x01, 0x00, 0x00]);
        Ok(())
    }

    #[test]
    fn test_max_payload_accepted() -> Result<()> {
        let payload = vec![0x5A; MAX_PAYLOAD];
        let bytes = encode_frame(CommandId::DATA_ARRAY, &payload)?;
        assert_eq!(bytes.len(), MIN_FRAME_SIZE + MAX_PAYLOAD);
        assert_eq!(&bytes[2..4], &[0x04, 0x00]);
        Ok(())
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let mut out = vec![0x42];
        let result = encode_frame_into(CommandId::DATA_ARRAY, &payload, &mut out);
        assert!(matches!(
            result,
            Err(ProtocolError::PayloadTooLarge { size: 1025, max: 1024 })
        ));
        assert_eq!(out, vec![0x42]);
        assert!(Frame::new(CommandId::DATA_ARRAY, payload).is_err());
    }

    #[test]
    fn test_validate() {
        let payload = [0x01, 0xF4];
        assert!(validate(CommandId(0x11), 2, &payload, 0x4DCD));
        assert!(!validate(CommandId(0x11), 2, &payload, 0x4DCC));
        assert!(!validate(CommandId(0x12), 2, &payload, 0x4DCD));
        assert!(!validate(CommandId(0x11), 3, &payload, 0x4DCD));
    }

    #[test]
    fn test_decode_roundtrip() -> Result<()> {
        let frame = Frame::new(CommandId::OLED_TEXT, b"hi".to_vec())?;
        let decoded = decode_frame(&frame.encode())?;
        assert_eq!(decoded, frame);
        Ok(())
    }

    #[test]
    fn test_decode_rejects_corruption() -> Result<()> {
        let mut bytes = encode_frame(CommandId::LED_BLINK, &[0x01, 0xF4])?;
        bytes[4] ^= 0xFF;
        assert!(matches!(
            decode_frame(&bytes),
            Err(ProtocolError::InvalidFrame(_))
        ));
        Ok(())
    }

    #[test]
    fn test_decode_rejects_short_and_unframed_input() {
        assert!(decode_frame(&[0xAA, 0x01, 0x00]).is_err());
        assert!(decode_frame(&[0x55, 0x01, 0x00, 0x00, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_decode_rejects_oversized_length_field() {
        let bytes = [0xAA, 0x50, 0x04, 0x01, 0x00, 0x00];
        assert!(matches!(
            decode_frame(&bytes),
            Err(ProtocolError::PayloadTooLarge { size: 1025, .. })
        ));
    }

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::empty(CommandId::ACK);
        assert!(frame.is_empty());
        assert_eq!(frame.len(), 0);
        assert_eq!(frame.wire_size(), 6);
        assert_eq!(frame.to_string(), "Frame(ACK (0x04), 0 bytes)");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip_and_bound() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let frame = Frame::new(CommandId::LED_BLINK, vec![0x01, 0xF4])?;
        let json = serde_json::to_string(&frame)?;
        let back: Frame = serde_json::from_str(&json)?;
        assert_eq!(back, frame);
        assert_eq!(back.encode(), [0xAA, 0x11, 0x00, 0x02, 0x01, 0xF4, 0x4D, 0xCD]);

        let oversized = format!(
            "{{\"command\":17,\"payload\":{:?}}}",
            vec![7u8; MAX_PAYLOAD + 1]
        );
        match serde_json::from_str::<Frame>(&oversized) {
            Ok(frame) => panic!("accepted {} byte payload", frame.payload().len()),
            Err(err) => assert!(err.to_string().contains("payload too large"), "{err}"),
        }
        Ok(())
    }
}
