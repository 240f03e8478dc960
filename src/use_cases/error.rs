use std::io;
use thiserror::Error;

/// Everything that can end a lockstep session early. The first one raised
/// wins; the session tears down and hands it back to the caller.
#[derive(Debug, Error)]
pub enum LockstepError {
    #[error("unknown message token")]
    UnknownMessage,
    #[error("command body could not be parsed")]
    InvalidCommandPacket,
    #[error("message not valid in the current setup state")]
    UnexpectedMessage,
    #[error("message too short to hold a command token")]
    UnexpectedMessageLength,
    #[error("frame header is not a length in 0..=512")]
    UnableToDecodeHeader,
    #[error("could not open a listening port")]
    UnableToOpenPort,
    #[error("a name was already assigned to this participant")]
    NameAlreadyAssigned,
    #[error("internal logic error: {0}")]
    LogicError(String),
    #[error("timed out waiting for peers")]
    ConnectionTimeout,
    #[error("connect order is missing a host or port")]
    MissingEndpoint,
    #[error("frame body of {0} bytes is too large")]
    FrameTooLarge(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LockstepError {
    /// Transport errors that show up when a peer hangs up as part of a normal
    /// shutdown.
    pub fn is_expected_during_shutdown(&self) -> bool {
        match self {
            LockstepError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
