use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("srtp: auth tag verification failed")]
    AuthFailed,
    #[error("srtp: packet too short for the configured auth tag")]
    ShortPacket,
    #[error("srtp: cipher not implemented by this crate")]
    UnsupportedCipher,
    #[error("srtp: auth algorithm not implemented by this crate")]
    UnsupportedAuth,
    #[error("srtcp: packet replayed or too old for the replay window")]
    Replayed,
    #[error("srtp: keying material has the wrong length for the configured cipher")]
    BadKeyLength,
    #[error("srtp: session keys not yet derived for this context")]
    KeysNotDerived,
}
