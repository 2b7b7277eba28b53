use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("stun: message shorter than the 20-byte header")]
    ShortHeader,
    #[error("stun: bad magic cookie")]
    BadMagicCookie,
    #[error("stun: message length is not a multiple of 4")]
    UnalignedLength,
    #[error("stun: declared length overruns buffer")]
    LengthOverrun,
    #[error("stun: attribute header truncated")]
    ShortAttributeHeader,
    #[error("stun: attribute value overruns message")]
    AttributeOverrun,
    #[error("stun: attribute {0:#06x} not present")]
    AttributeNotFound(u16),
    #[error("stun: MESSAGE-INTEGRITY is not 20 bytes")]
    BadIntegrityLength,
    #[error("stun: message fails integrity check")]
    IntegrityMismatch,
    #[error("stun: FINGERPRINT does not match")]
    FingerprintMismatch,
    #[error("stun: unsupported address family in XOR-MAPPED-ADDRESS")]
    UnsupportedAddressFamily,
}
