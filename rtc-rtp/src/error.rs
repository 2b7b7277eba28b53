use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("rtp: packet too short for fixed header")]
    ShortHeader,
    #[error("rtp: extension length overruns packet")]
    ShortExtension,
    #[error("rtp: header version {0} unsupported")]
    UnsupportedVersion(u8),
    #[error("rtp: packet not ready, no buffer applied")]
    NotReady,
    #[error("rtp: destination span too small: need {need}, have {have}")]
    DstTooSmall { need: usize, have: usize },
}
