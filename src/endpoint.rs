//! One end of a serial link: a byte stream paired with its own receiver
//!
//! Designed for a cooperative poll loop. [`Endpoint::poll_frame`] never
//! waits for bytes that have not arrived; it drains what the stream has,
//! stops at the first complete frame and leaves the rest for the next call.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::command::{CommandFamily, CommandId, ErrorCode};
use crate::dispatch::{Dispatcher, Reply};
use crate::error::{ProtocolError, Result};
use crate::frame::{encode_frame_into, Frame};
use crate::message::Message;
use crate::receiver::{Receiver, ReceiverStats};

/// Pause between empty polls while waiting for a reply
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A framed connection over any `Read + Write` stream
///
/// Non-blocking streams should report "no data" as `WouldBlock`; streams
/// with a read timeout may report `TimedOut`. Both, and EOF, end a poll
/// without a frame.
pub struct Endpoint<S, C: Clock = SystemClock> {
    stream: S,
    receiver: Receiver<C>,
    scratch: Vec<u8>,
}

impl<S: Read + Write> Endpoint<S> {
    /// Endpoint with a default receiver
    pub fn new(stream: S) -> Self {
        Self::with_receiver(stream, Receiver::new())
    }
}

impl<S: Read + Write, C: Clock> Endpoint<S, C> {
    /// Endpoint using a preconfigured receiver
    pub fn with_receiver(stream: S, receiver: Receiver<C>) -> Self {
        Endpoint {
            stream,
            receiver,
            scratch: Vec::new(),
        }
    }

    /// Encode and write one frame, then flush
    pub fn send_frame(&mut self, command: CommandId, payload: &[u8]) -> Result<()> {
        self.scratch.clear();
        encode_frame_into(command, payload, &mut self.scratch)?;
        self.stream.write_all(&self.scratch)?;
        self.stream.flush()?;
        debug!(%command, len = payload.len(), "frame sent");
        Ok(())
    }

    /// Write an already-built frame
    pub fn send(&mut self, frame: &Frame) -> Result<()> {
        self.send_frame(frame.command, frame.payload())
    }

    /// Write a typed message
    pub fn send_message<M: Message>(&mut self, message: &M) -> Result<()> {
        self.send(&message.to_frame()?)
    }

    /// Write a frame with no payload
    pub fn send_command(&mut self, command: CommandId) -> Result<()> {
        self.send_frame(command, &[])
    }

    /// Acknowledge the previous command
    pub fn send_ack(&mut self) -> Result<()> {
        self.send_command(CommandId::ACK)
    }

    /// Answer a PING
    pub fn send_pong(&mut self) -> Result<()> {
        self.send_command(CommandId::PONG)
    }

    /// Reject the previous command with a reason
    pub fn send_error(&mut self, code: ErrorCode) -> Result<()> {
        self.send_frame(CommandId::ERROR, &[code.as_u8()])
    }

    /// Drain available bytes until one frame completes
    ///
    /// Returns `Ok(None)` as soon as the stream has nothing more to give.
    /// Corrupt or stale data is absorbed by the receiver, never returned as
    /// an error; only stream failures are.
    pub fn poll_frame(&mut self) -> Result<Option<Frame>> {
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    if let Some(view) = self.receiver.feed_byte(byte[0]) {
                        let frame = view.to_frame();
                        debug!(command = %frame.command, len = frame.payload().len(), "frame received");
                        return Ok(Some(frame));
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(None)
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Poll one frame, dispatch it and write the reply
    ///
    /// Returns the frame that was handled, if any.
    pub fn serve_once(&mut self, dispatcher: &mut Dispatcher) -> Result<Option<Frame>> {
        let Some(frame) = self.poll_frame()? else {
            return Ok(None);
        };
        if let Some(reply) = dispatcher.dispatch(&frame) {
            if let Err(err) = self.send(&reply) {
                warn!(command = %frame.command, error = %err, "failed to send reply");
                return Err(err);
            }
        }
        Ok(Some(frame))
    }

    /// Poll until a frame matching `accept` arrives or `timeout` passes
    ///
    /// Frames that do not match are dropped. The deadline runs on both the
    /// receiver clock and wall time, whichever expires first.
    pub fn wait_for<F>(&mut self, timeout: Duration, mut accept: F) -> Result<Frame>
    where
        F: FnMut(&Frame) -> bool,
    {
        let wall_start = Instant::now();
        let start = self.receiver.clock().now_ms();
        let limit = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        loop {
            match self.poll_frame()? {
                Some(frame) if accept(&frame) => return Ok(frame),
                Some(frame) => {
                    debug!(command = %frame.command, "ignoring frame while waiting for reply");
                }
                None => {}
            }
            if self.receiver.clock().now_ms().wrapping_sub(start) >= limit
                || wall_start.elapsed() >= timeout
            {
                return Err(ProtocolError::Timeout(timeout));
            }
            std::thread::sleep(IDLE_POLL_INTERVAL);
        }
    }

    /// Probe the peer with PING and wait for its PONG
    pub fn ping(&mut self, timeout: Duration) -> Result<()> {
        self.send_command(CommandId::PING)?;
        self.wait_for(timeout, |frame| frame.command == CommandId::PONG)?;
        Ok(())
    }

    /// Send `request` and wait for its reply
    ///
    /// A reply is ACK, ERROR, PONG for a PING, or a data frame from the
    /// same command family as the request.
    pub fn request(&mut self, request: &Frame, timeout: Duration) -> Result<Reply> {
        self.send(request)?;
        let family = request.command.family();
        let reply = self.wait_for(timeout, |frame| {
            matches!(frame.command, CommandId::ACK | CommandId::ERROR)
                || (request.command == CommandId::PING && frame.command == CommandId::PONG)
                || (family != CommandFamily::System
                    && frame.command.family() == family
                    && frame.command != request.command)
        })?;
        Reply::from_frame(reply)
    }

    /// Receiver counters
    pub fn stats(&self) -> ReceiverStats {
        self.receiver.stats()
    }

    /// The receiver parsing this stream
    pub fn receiver(&self) -> &Receiver<C> {
        &self.receiver
    }

    /// Borrow the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Consume the endpoint and return the stream
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S, C: Clock> std::fmt::Debug for Endpoint<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("receiver", &self.receiver)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use super::*;
    use crate::clock::ManualClock;
    use crate::dispatch::{ack_frame, error_frame};
    use crate::frame::{decode_frame, encode_frame};
    use crate::message::LedBlink;
    use crate::wire::MIN_FRAME_SIZE;

    /// Scripted stream: reads come from `input`, writes land in `output`
    #[derive(Default)]
    struct Wire {
        input: VecDeque<u8>,
        output: Vec<u8>,
        would_block: bool,
    }

    impl Wire {
        fn with_input(bytes: &[u8]) -> Self {
            Wire {
                input: bytes.iter().copied().collect(),
                ..Wire::default()
            }
        }
    }

    impl Read for Wire {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.input.pop_front() {
                Some(byte) if !buf.is_empty() => {
                    buf[0] = byte;
                    Ok(1)
                }
                Some(byte) => {
                    self.input.push_front(byte);
                    Ok(0)
                }
                None if self.would_block => Err(ErrorKind::WouldBlock.into()),
                None => Ok(0),
            }
        }
    }

    impl Write for Wire {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_send_helpers_write_exact_frames() -> Result<()> {
        let mut endpoint = Endpoint::new(Wire::default());
        endpoint.send_ack()?;
        endpoint.send_error(ErrorCode::InvalidParam)?;
        endpoint.send_message(&LedBlink { duration_ms: 500 })?;

        let out = &endpoint.get_ref().output;
        assert_eq!(decode_frame(&out[..6])?, ack_frame());
        assert_eq!(decode_frame(&out[6..13])?, error_frame(ErrorCode::InvalidParam));
        assert_eq!(&out[13..], &[0xAA, 0x11, 0x00, 0x02, 0x01, 0xF4, 0x4D, 0xCD]);
        Ok(())
    }

    #[test]
    fn test_oversized_send_writes_nothing() {
        let mut endpoint = Endpoint::new(Wire::default());
        let result = endpoint.send_frame(CommandId::DATA_ARRAY, &[0u8; 1025]);
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
        assert!(endpoint.get_ref().output.is_empty());
    }

    #[test]
    fn test_poll_returns_one_frame_per_call() -> Result<()> {
        let mut input = encode_frame(CommandId::PING, &[])?;
        input.extend(encode_frame(CommandId::LED_SET, &[1])?);
        let mut endpoint = Endpoint::new(Wire::with_input(&input));

        let first = endpoint.poll_frame()?;
        assert_eq!(first, Some(Frame::empty(CommandId::PING)));
        assert_eq!(endpoint.get_ref().input.len(), 7);

        let second = endpoint.poll_frame()?;
        assert_eq!(second.map(|f| f.command), Some(CommandId::LED_SET));
        assert_eq!(endpoint.poll_frame()?, None);
        Ok(())
    }

    #[test]
    fn test_poll_would_block_keeps_partial_state() -> Result<()> {
        let wire = encode_frame(CommandId::ACK, &[])?;
        let mut stream = Wire::with_input(&wire[..3]);
        stream.would_block = true;
        let mut endpoint = Endpoint::new(stream);

        assert_eq!(endpoint.poll_frame()?, None);
        assert!(!endpoint.receiver().is_idle());

        endpoint.get_mut().input.extend(&wire[3..]);
        assert_eq!(endpoint.poll_frame()?, Some(ack_frame()));
        Ok(())
    }

    #[test]
    fn test_serve_once_answers_ping_and_unknown() -> Result<()> {
        let mut input = encode_frame(CommandId::PING, &[])?;
        input.extend(encode_frame(CommandId(0x99), &[1, 2, 3])?);
        let mut endpoint = Endpoint::new(Wire::with_input(&input));
        let mut dispatcher = Dispatcher::new();

        endpoint.serve_once(&mut dispatcher)?;
        endpoint.serve_once(&mut dispatcher)?;
        assert_eq!(endpoint.serve_once(&mut dispatcher)?, None);

        let out = &endpoint.get_ref().output;
        assert_eq!(decode_frame(&out[..MIN_FRAME_SIZE])?.command, CommandId::PONG);
        assert_eq!(
            decode_frame(&out[MIN_FRAME_SIZE..])?,
            error_frame(ErrorCode::InvalidCommand)
        );
        Ok(())
    }

    #[test]
    fn test_ping_skips_unrelated_frames() -> Result<()> {
        let mut input = encode_frame(CommandId::SENSOR_DATA, &[1, 0, 9])?;
        input.extend(encode_frame(CommandId::PONG, &[])?);
        let mut endpoint = Endpoint::new(Wire::with_input(&input));

        endpoint.ping(Duration::from_millis(500))?;
        assert_eq!(
            decode_frame(&endpoint.get_ref().output)?,
            Frame::empty(CommandId::PING)
        );
        Ok(())
    }

    #[test]
    fn test_ping_times_out_without_pong() {
        let mut endpoint = Endpoint::new(Wire::default());
        let result = endpoint.ping(Duration::from_millis(5));
        assert!(matches!(result, Err(ProtocolError::Timeout(_))));
    }

    #[test]
    fn test_ping_times_out_on_frozen_clock() {
        let mut stream = Wire::default();
        stream.would_block = true;
        let rx = Receiver::with_clock(ManualClock::new(0));
        let mut endpoint = Endpoint::with_receiver(stream, rx);

        let result = endpoint.ping(Duration::from_millis(5));
        assert!(matches!(result, Err(ProtocolError::Timeout(_))));
    }

    /// Stream with no data whose reads move a shared clock forward
    struct TickingWire {
        clock: ManualClock,
    }

    impl Read for TickingWire {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            self.clock.advance(1_000);
            Err(ErrorKind::WouldBlock.into())
        }
    }

    impl Write for TickingWire {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_receiver_clock_drives_deadline() {
        let clock = ManualClock::new(0);
        let stream = TickingWire {
            clock: clock.clone(),
        };
        let mut endpoint = Endpoint::with_receiver(stream, Receiver::with_clock(clock.clone()));

        let result = endpoint.ping(Duration::from_secs(60));
        assert!(matches!(result, Err(ProtocolError::Timeout(_))));
        assert!(clock.now_ms() >= 60_000);
        assert!(clock.now_ms() < 61_000);
    }

    #[test]
    fn test_request_ping_accepts_pong() -> Result<()> {
        let input = encode_frame(CommandId::PONG, &[])?;
        let mut endpoint = Endpoint::new(Wire::with_input(&input));

        let reply = endpoint.request(&Frame::empty(CommandId::PING), Duration::from_millis(30))?;
        assert_eq!(reply, Reply::Data(Frame::empty(CommandId::PONG)));
        Ok(())
    }

    #[test]
    fn test_request_returns_family_reply() -> Result<()> {
        let mut input = encode_frame(CommandId::LED_SET, &[0])?;
        input.extend(encode_frame(CommandId::ENCODER_DATA, &[0, 42, 5, 1])?);
        let mut endpoint = Endpoint::new(Wire::with_input(&input));

        let request = Frame::empty(CommandId::ENCODER_READ);
        let reply = endpoint.request(&request, Duration::from_millis(500))?;
        match reply {
            Reply::Data(frame) => assert_eq!(frame.command, CommandId::ENCODER_DATA),
            other => panic!("unexpected reply {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_request_surfaces_error_code() -> Result<()> {
        let input = error_frame(ErrorCode::NotReady).encode();
        let mut endpoint = Endpoint::new(Wire::with_input(&input));
        let request = Frame::empty(CommandId::OLED_CLEAR);
        let reply = endpoint.request(&request, Duration::from_millis(500))?;
        assert_eq!(reply, Reply::Error(ErrorCode::NotReady));
        Ok(())
    }

    #[test]
    fn test_manual_clock_endpoint_counts_noise() -> Result<()> {
        let clock = ManualClock::new(0);
        let mut input = vec![0x00, 0x01, 0x02];
        input.extend(encode_frame(CommandId::ACK, &[])?);
        let mut endpoint =
            Endpoint::with_receiver(Wire::with_input(&input), Receiver::with_clock(clock));
        assert_eq!(endpoint.poll_frame()?, Some(ack_frame()));
        assert_eq!(endpoint.stats().bytes_skipped, 3);
        Ok(())
    }
}
