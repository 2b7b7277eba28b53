use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("h264: empty rtp payload")]
    EmptyPayload,
    #[error("h264: fu-a packet shorter than fu header")]
    ShortFuHeader,
    #[error("h264: stap-a nal size exceeds packet bounds")]
    StapANalOverrun,
}
