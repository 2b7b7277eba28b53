use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("wfb: frame is shorter than the 802.11 QoS Data header")]
    ShortFrame,
    #[error("wfb: frame control bytes are not QoS Data (0x08 0x01)")]
    NotQosData,
    #[error("wfb: frame payload is empty")]
    EmptyPayload,
    #[error("wfb: mac_src/mac_dst air-ground or radio-port byte mismatch")]
    AddressMismatch,
    #[error("wfb: key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("wfb: session-key announcement failed to authenticate under the long-term key")]
    SessionKeySealInvalid,
    #[error("wfb: no session key has been established yet")]
    NoSessionKey,
    #[error("wfb: AEAD authentication failed")]
    AuthFailed,
    #[error("wfb: FEC header mismatch with a prior fragment in the same block")]
    FecHeaderMismatch,
    #[error("wfb: fragment index out of range for this block")]
    FragmentIndexOutOfRange,
    #[error("wfb: dedup/FEC frame is shorter than its fixed header")]
    ShortHeader,
}
