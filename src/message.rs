//! Typed messages for the shared peripheral vocabulary
//!
//! Each message knows its command identifier and payload layout. The
//! layouts are a contract between the bridge and the microcontroller
//! firmware; the frame layer does not check them.

use crate::command::CommandId;
use crate::error::{ProtocolError, Result};
use crate::frame::Frame;
use crate::payload::{PayloadBuilder, PayloadReader};
use crate::wire::MAX_PAYLOAD;

/// A payload layout bound to one command identifier
pub trait Message: Sized {
    /// Command this message travels under
    const COMMAND: CommandId;

    /// Write the payload fields
    fn write_payload(&self, builder: &mut PayloadBuilder<'_>) -> Result<()>;

    /// Read the payload fields
    fn read_payload(reader: &mut PayloadReader<'_>) -> Result<Self>;

    /// Build the frame for this message
    fn to_frame(&self) -> Result<Frame> {
        let mut buf = [0u8; MAX_PAYLOAD];
        let mut builder = PayloadBuilder::new(&mut buf);
        self.write_payload(&mut builder)?;
        Frame::new(Self::COMMAND, builder.as_slice())
    }

    /// Parse a received frame, checking its command identifier
    fn from_frame(frame: &Frame) -> Result<Self> {
        if frame.command != Self::COMMAND {
            return Err(ProtocolError::UnexpectedCommand {
                expected: Self::COMMAND,
                actual: frame.command,
            });
        }
        Self::read_payload(&mut PayloadReader::new(frame.payload()))
    }
}

macro_rules! empty_message {
    ($(#[$doc:meta])* $name:ident => $command:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name;

        impl Message for $name {
            const COMMAND: CommandId = $command;

            fn write_payload(&self, _builder: &mut PayloadBuilder<'_>) -> Result<()> {
                Ok(())
            }

            fn read_payload(_reader: &mut PayloadReader<'_>) -> Result<Self> {
                Ok($name)
            }
        }
    };
}

empty_message!(
    /// Liveness probe
    Ping => CommandId::PING
);
empty_message!(
    /// Blank the OLED display
    OledClear => CommandId::OLED_CLEAR
);
empty_message!(
    /// Ask for the rotary encoder state
    EncoderRead => CommandId::ENCODER_READ
);
empty_message!(
    /// Zero the rotary encoder position
    EncoderReset => CommandId::ENCODER_RESET
);

/// Switch the LED on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedSet {
    pub on: bool,
}

impl Message for LedSet {
    const COMMAND: CommandId = CommandId::LED_SET;

    fn write_payload(&self, builder: &mut PayloadBuilder<'_>) -> Result<()> {
        builder.put_u8(self.on as u8)
    }

    fn read_payload(reader: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(LedSet {
            on: reader.read_u8()? != 0,
        })
    }
}

/// Blink the LED for `duration_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedBlink {
    pub duration_ms: u16,
}

impl Message for LedBlink {
    const COMMAND: CommandId = CommandId::LED_BLINK;

    fn write_payload(&self, builder: &mut PayloadBuilder<'_>) -> Result<()> {
        builder.put_u16(self.duration_ms)
    }

    fn read_payload(reader: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(LedBlink {
            duration_ms: reader.read_u16()?,
        })
    }
}

/// Draw text at a pixel position
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OledText {
    pub x: u8,
    pub y: u8,
    pub text: String,
}

impl Message for OledText {
    const COMMAND: CommandId = CommandId::OLED_TEXT;

    fn write_payload(&self, builder: &mut PayloadBuilder<'_>) -> Result<()> {
        builder.put_u8(self.x)?;
        builder.put_u8(self.y)?;
        builder.put_str(&self.text)
    }

    fn read_payload(reader: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(OledText {
            x: reader.read_u8()?,
            y: reader.read_u8()?,
            text: reader.read_str()?.to_owned(),
        })
    }
}

/// A single sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorData {
    pub sensor_id: u8,
    pub value: i16,
}

impl Message for SensorData {
    const COMMAND: CommandId = CommandId::SENSOR_DATA;

    fn write_payload(&self, builder: &mut PayloadBuilder<'_>) -> Result<()> {
        builder.put_u8(self.sensor_id)?;
        builder.put_i16(self.value)
    }

    fn read_payload(reader: &mut PayloadReader<'_>) -> Result<Self> {
        Ok(SensorData {
            sensor_id: reader.read_u8()?,
            value: reader.read_i16()?,
        })
    }
}

/// Rotary encoder state
///
/// Older firmware sends only the position; velocity and button then read
/// as zero and released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderData {
    pub position: i16,
    /// Detents since the last report, signed by direction
    pub velocity: i8,
    pub button_pressed: bool,
}

impl Message for EncoderData {
    const COMMAND: CommandId = CommandId::ENCODER_DATA;

    fn write_payload(&self, builder: &mut PayloadBuilder<'_>) -> Result<()> {
        builder.put_i16(self.position)?;
        builder.put_u8(self.velocity as u8)?;
        builder.put_u8(self.button_pressed as u8)
    }

    fn read_payload(reader: &mut PayloadReader<'_>) -> Result<Self> {
        let position = reader.read_i16()?;
        let velocity = reader.read_u8().map(|v| v as i8).unwrap_or(0);
        let button_pressed = reader.read_u8().map(|b| b != 0).unwrap_or(false);
        Ok(EncoderData {
            position,
            velocity,
            button_pressed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::decode_frame;

    #[test]
    fn test_led_blink_matches_canonical_frame() -> Result<()> {
        let frame = LedBlink { duration_ms: 500 }.to_frame()?;
        assert_eq!(
            frame.encode(),
            vec![0xAA, 0x11, 0x00, 0x02, 0x01, 0xF4, 0x4D, 0xCD]
        );
        Ok(())
    }

    #[test]
    fn test_empty_messages_are_six_bytes() -> Result<()> {
        assert_eq!(Ping.to_frame()?.wire_size(), 6);
        assert_eq!(OledClear.to_frame()?.command, CommandId::OLED_CLEAR);
        assert_eq!(EncoderRead::from_frame(&EncoderRead.to_frame()?)?, EncoderRead);
        Ok(())
    }

    #[test]
    fn test_led_set_payload() -> Result<()> {
        assert_eq!(LedSet { on: true }.to_frame()?.payload(), &[1]);
        assert_eq!(LedSet { on: false }.to_frame()?.payload(), &[0]);
        Ok(())
    }

    #[test]
    fn test_oled_text_through_wire() -> Result<()> {
        let msg = OledText {
            x: 10,
            y: 20,
            text: "Hello Arduino!".to_string(),
        };
        let frame = decode_frame(&msg.to_frame()?.encode())?;
        assert_eq!(OledText::from_frame(&frame)?, msg);
        Ok(())
    }

    #[test]
    fn test_oled_text_too_long() {
        let msg = OledText {
            x: 0,
            y: 0,
            text: "X".repeat(300),
        };
        assert!(matches!(msg.to_frame(), Err(ProtocolError::StringTooLong(300))));
    }

    #[test]
    fn test_encoder_data_defaults() -> Result<()> {
        let full = EncoderData {
            position: 42,
            velocity: 5,
            button_pressed: true,
        };
        assert_eq!(EncoderData::from_frame(&full.to_frame()?)?, full);

        let short = Frame::new(CommandId::ENCODER_DATA, vec![0xFF, 0xD6])?;
        let parsed = EncoderData::from_frame(&short)?;
        assert_eq!(parsed.position, -42);
        assert_eq!(parsed.velocity, 0);
        assert!(!parsed.button_pressed);
        Ok(())
    }

    #[test]
    fn test_encoder_data_negative_velocity() -> Result<()> {
        let frame = Frame::new(CommandId::ENCODER_DATA, vec![0x00, 0x05, 0xFE, 0x01])?;
        let parsed = EncoderData::from_frame(&frame)?;
        assert_eq!(parsed.position, 5);
        assert_eq!(parsed.velocity, -2);
        assert!(parsed.button_pressed);

        let turning_back = EncoderData {
            position: -300,
            velocity: -3,
            button_pressed: false,
        };
        assert_eq!(turning_back.to_frame()?.payload(), &[0xFE, 0xD4, 0xFD, 0x00]);
        assert_eq!(EncoderData::from_frame(&turning_back.to_frame()?)?, turning_back);

        // Any nonzero button byte reads as pressed
        let frame = Frame::new(CommandId::ENCODER_DATA, vec![0x00, 0x00, 0x00, 0x07])?;
        assert!(EncoderData::from_frame(&frame)?.button_pressed);
        Ok(())
    }

    #[test]
    fn test_sensor_data_requires_both_fields() -> Result<()> {
        let frame = Frame::new(CommandId::SENSOR_DATA, vec![3])?;
        assert!(SensorData::from_frame(&frame).is_err());

        let frame = SensorData {
            sensor_id: 3,
            value: -512,
        }
        .to_frame()?;
        assert_eq!(frame.payload(), &[3, 0xFE, 0x00]);
        Ok(())
    }

    #[test]
    fn test_wrong_command_rejected() {
        let frame = Frame::empty(CommandId::ACK);
        assert!(matches!(
            LedBlink::from_frame(&frame),
            Err(ProtocolError::UnexpectedCommand { .. })
        ));
    }
}
