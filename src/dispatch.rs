//! Command dispatch and the reply conventions built on top of frames
//!
//! A [`Dispatcher`] maps command identifiers to application handlers. The
//! protocol core knows nothing about what a handler does; it only enforces
//! the conversation rules:
//!
//! - PING is always answered with PONG
//! - a command nobody registered is answered with `ERROR(InvalidCommand)`
//! - PONG, ACK and ERROR are never answered
//! - every ERROR frame carries a one-byte [`ErrorCode`]

use std::collections::HashMap;

use tracing::debug;

use crate::command::{CommandId, ErrorCode};
use crate::error::{ProtocolError, Result};
use crate::frame::Frame;

/// What a handler wants sent back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Processed successfully
    Ack,
    /// Rejected, with a reason
    Error(ErrorCode),
    /// Data-bearing response
    Data(Frame),
    /// Send nothing
    Silent,
}

impl Reply {
    /// The frame to put on the wire, if any
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Reply::Ack => Some(ack_frame()),
            Reply::Error(code) => Some(error_frame(code)),
            Reply::Data(frame) => Some(frame),
            Reply::Silent => None,
        }
    }

    /// Interpret a frame received in answer to a request
    ///
    /// ERROR frames must carry a known reason code.
    pub fn from_frame(frame: Frame) -> Result<Reply> {
        match frame.command {
            CommandId::ACK => Ok(Reply::Ack),
            CommandId::ERROR => {
                let Some(&code) = frame.payload().first() else {
                    return Err(ProtocolError::invalid_frame(
                        "ERROR frame without reason code",
                    ));
                };
                Ok(Reply::Error(ErrorCode::try_from(code)?))
            }
            _ => Ok(Reply::Data(frame)),
        }
    }
}

impl From<std::result::Result<(), ErrorCode>> for Reply {
    fn from(result: std::result::Result<(), ErrorCode>) -> Self {
        match result {
            Ok(()) => Reply::Ack,
            Err(code) => Reply::Error(code),
        }
    }
}

/// Empty ACK frame
pub fn ack_frame() -> Frame {
    Frame::empty(CommandId::ACK)
}

/// Empty PONG frame
pub fn pong_frame() -> Frame {
    Frame::empty(CommandId::PONG)
}

/// ERROR frame carrying `code`
pub fn error_frame(code: ErrorCode) -> Frame {
    Frame::from_parts(CommandId::ERROR, vec![code.as_u8()])
}

type Handler = Box<dyn FnMut(&Frame) -> Reply>;

/// Handler table keyed by command identifier
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<CommandId, Handler>,
}

impl Dispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Dispatcher {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `command`, replacing any previous one
    ///
    /// Registering PING overrides the built-in PONG answer.
    pub fn register<F>(&mut self, command: CommandId, handler: F) -> &mut Self
    where
        F: FnMut(&Frame) -> Reply + 'static,
    {
        self.handlers.insert(command, Box::new(handler));
        self
    }

    /// Remove the handler for `command`
    pub fn unregister(&mut self, command: CommandId) -> bool {
        self.handlers.remove(&command).is_some()
    }

    /// Whether `command` has a handler
    pub fn is_registered(&self, command: CommandId) -> bool {
        self.handlers.contains_key(&command)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route a validated frame and return the reply frame, if one is due
    pub fn dispatch(&mut self, frame: &Frame) -> Option<Frame> {
        if let Some(handler) = self.handlers.get_mut(&frame.command) {
            return handler(frame).into_frame();
        }

        match frame.command {
            CommandId::PING => Some(pong_frame()),
            command if command.is_reply() => None,
            command => {
                debug!(%command, "no handler registered");
                Some(error_frame(ErrorCode::InvalidCommand))
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut commands: Vec<_> = self.handlers.keys().copied().collect();
        commands.sort();
        f.debug_struct("Dispatcher")
            .field("commands", &commands)
            .finish()
    }
}
