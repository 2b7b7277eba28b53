use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by every protocol crate in the workspace.
///
/// Packet-path errors carry no payload beyond what's needed to log and count them
/// (see error handling design: they never bubble across packet boundaries). Resource
/// errors are returned so a caller can choose to log+drop rather than the crate
/// deciding for them.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer pool exhausted")]
    ErrBufferPoolExhausted,
    #[error("buffer too small: need {need}, have {have}")]
    ErrBufferTooSmall { need: usize, have: usize },
    #[error("packet not ready: buffer not currently borrowed")]
    ErrNotReady,
    #[error("packet too short")]
    ErrShortHeader,
    #[error("packet too big: {0} exceeds MAX_UDP_SIZE")]
    ErrPacketTooBig(usize),
    #[error("i/o timeout")]
    ErrTimeout,
    #[error("already closed")]
    ErrAlreadyClosed,
    #[error("operation would exceed retry budget")]
    ErrConcurrencyExceeded,
    #[error("{0}")]
    Io(String),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
