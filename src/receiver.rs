//! Byte-at-a-time receiver state machine
//!
//! Consumes an unreliable byte stream and yields one CRC-valid frame at a
//! time. Noise, oversized length fields, checksum failures and stalled
//! partial frames are all handled the same way: the partial frame is
//! dropped and the receiver goes back to hunting for the start marker.
//! Nothing is ever reported upward except the absence of a frame.

use std::time::Duration;

use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::command::CommandId;
use crate::frame::{self, Frame};
use crate::wire::{DEFAULT_TIMEOUT_MS, MAX_PAYLOAD, START_BYTE};

/// Parse phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// Idle, scanning for `0xAA`
    WaitStart,
    WaitCmd,
    WaitLenHigh,
    WaitLenLow,
    WaitPayload,
    WaitCrcHigh,
    WaitCrcLow,
}

/// A completed frame borrowed from the receiver's buffer
///
/// The payload is overwritten by the next frame, so call
/// [`FrameView::to_frame`] to keep it past the next feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    /// Command identifier
    pub command: CommandId,
    /// Payload bytes
    pub payload: &'a [u8],
}

impl FrameView<'_> {
    /// Copy into an owned [`Frame`]
    pub fn to_frame(&self) -> Frame {
        Frame::from_parts(self.command, self.payload.to_vec())
    }
}

/// Counters describing what the receiver has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReceiverStats {
    /// Frames that passed the CRC check
    pub frames: u64,
    /// Complete frames dropped for a CRC mismatch
    pub crc_errors: u64,
    /// Partial frames dropped for a length field over the maximum
    pub oversized: u64,
    /// Partial frames dropped for going stale
    pub timeouts: u64,
    /// Bytes ignored while scanning for a start marker
    pub bytes_skipped: u64,
}

impl ReceiverStats {
    /// Frames started but never delivered
    pub fn discarded(&self) -> u64 {
        self.crc_errors + self.oversized + self.timeouts
    }
}

/// Incremental frame parser for one connection
///
/// One instance per byte stream. Sharing an instance between two sources
/// interleaves their bytes and corrupts both parses.
pub struct Receiver<C: Clock = SystemClock> {
    state: RxState,
    command: CommandId,
    length: u16,
    payload: [u8; MAX_PAYLOAD],
    count: usize,
    crc: u16,
    started_at: u64,
    timeout_ms: u64,
    clock: C,
    stats: ReceiverStats,
}

impl Receiver<SystemClock> {
    /// Receiver with the default 100 ms staleness timeout
    pub fn new() -> Self {
        ReceiverBuilder::new().build()
    }
}

impl Default for Receiver<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Receiver<C> {
    /// Receiver reading time from `clock`
    pub fn with_clock(clock: C) -> Self {
        ReceiverBuilder::new().with_clock(clock).build()
    }

    /// Current parse phase
    pub fn state(&self) -> RxState {
        self.state
    }

    /// True when no partial frame is held
    pub fn is_idle(&self) -> bool {
        self.state == RxState::WaitStart
    }

    /// Staleness threshold
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Counters since construction
    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// The clock this receiver reads
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Drop any partial frame and return to scanning
    pub fn reset(&mut self) {
        self.state = RxState::WaitStart;
        self.count = 0;
    }

    /// Feed one byte, timestamped by the receiver's clock
    pub fn feed_byte(&mut self, byte: u8) -> Option<FrameView<'_>> {
        let now = self.clock.now_ms();
        self.feed_byte_at(byte, now)
    }

    /// Feed one byte that arrived at `now_ms`
    ///
    /// Staleness is only checked here, on byte arrival. A partial frame
    /// followed by silence stays pending until the next byte comes in.
    pub fn feed_byte_at(&mut self, byte: u8, now_ms: u64) -> Option<FrameView<'_>> {
        if self.state != RxState::WaitStart
            && now_ms.wrapping_sub(self.started_at) > self.timeout_ms
        {
            debug!(
                state = ?self.state,
                elapsed_ms = now_ms.wrapping_sub(self.started_at),
                "dropping stale partial frame"
            );
            self.stats.timeouts += 1;
            self.reset();
        }

        let state = self.state;
        match state {
            RxState::WaitStart => {
                if byte == START_BYTE {
                    trace!("start marker");
                    self.started_at = now_ms;
                    self.state = RxState::WaitCmd;
                } else {
                    self.stats.bytes_skipped += 1;
                }
            }
            RxState::WaitCmd => {
                self.command = CommandId(byte);
                self.state = RxState::WaitLenHigh;
            }
            RxState::WaitLenHigh => {
                self.length = (byte as u16) << 8;
                self.state = RxState::WaitLenLow;
            }
            RxState::WaitLenLow => {
                self.length |= byte as u16;
                if self.length as usize > MAX_PAYLOAD {
                    debug!(length = self.length, "dropping frame with oversized length");
                    self.stats.oversized += 1;
                    self.reset();
                } else if self.length == 0 {
                    self.state = RxState::WaitCrcHigh;
                } else {
                    self.count = 0;
                    self.state = RxState::WaitPayload;
                }
            }
            RxState::WaitPayload => {
                self.payload[self.count] = byte;
                self.count += 1;
                if self.count >= self.length as usize {
                    self.state = RxState::WaitCrcHigh;
                }
            }
            RxState::WaitCrcHigh => {
                self.crc = (byte as u16) << 8;
                self.state = RxState::WaitCrcLow;
            }
            RxState::WaitCrcLow => {
                self.crc |= byte as u16;
                self.reset();

                let len = self.length as usize;
                if frame::validate(self.command, self.length, &self.payload[..len], self.crc) {
                    self.stats.frames += 1;
                    trace!(command = %self.command, len, "frame complete");
                    return Some(FrameView {
                        command: self.command,
                        payload: &self.payload[..len],
                    });
                }

                debug!(
                    command = %self.command,
                    len,
                    received = self.crc,
                    "dropping frame with CRC mismatch"
                );
                self.stats.crc_errors += 1;
            }
        }

        None
    }

    /// Feed a chunk and collect every frame it completes
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if let Some(view) = self.feed_byte(byte) {
                frames.push(view.to_frame());
            }
        }
        frames
    }
}

impl<C: Clock> std::fmt::Debug for Receiver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("state", &self.state)
            .field("command", &self.command)
            .field("length", &self.length)
            .field("count", &self.count)
            .field("timeout_ms", &self.timeout_ms)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Builder for [`Receiver`]
#[derive(Debug, Clone)]
pub struct ReceiverBuilder<C = SystemClock> {
    timeout: Duration,
    clock: C,
}

impl ReceiverBuilder<SystemClock> {
    /// Defaults: 100 ms timeout, system clock
    pub fn new() -> Self {
        ReceiverBuilder {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            clock: SystemClock::new(),
        }
    }
}

impl Default for ReceiverBuilder<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ReceiverBuilder<C> {
    /// Set the staleness timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read time from a different clock
    pub fn with_clock<D: Clock>(self, clock: D) -> ReceiverBuilder<D> {
        ReceiverBuilder {
            timeout: self.timeout,
            clock,
        }
    }

    /// Build the receiver
    pub fn build(self) -> Receiver<C> {
        Receiver {
            state: RxState::WaitStart,
            command: CommandId(0),
            length: 0,
            payload: [0u8; MAX_PAYLOAD],
            count: 0,
            crc: 0,
            started_at: 0,
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            clock: self.clock,
            stats: ReceiverStats::default(),
        }
    }
}
