use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Internal packet-path / wiring error type. Distinct from [`SignalingError`],
/// which is the closed enumeration the offer/answer surface returns.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("ice: {0}")]
    Ice(#[from] ice::Error),
    #[error("dtls: {0}")]
    Dtls(#[from] dtls::Error),
    #[error("srtp: {0}")]
    Srtp(#[from] srtp::Error),
    #[error("sdp: {0}")]
    Sdp(#[from] sdp::Error),
    #[error("rtp: {0}")]
    Rtp(#[from] rtp::Error),
    #[error("wfb: {0}")]
    Wfb(#[from] wfb::Error),
    #[error("shared: {0}")]
    Shared(#[from] shared::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer connection is closed")]
    Closed,
    #[error("sequence number allocator exhausted its compare-and-swap retries")]
    ConcurrencyExceeded,
    #[error("signaling error: {0:?}")]
    Signaling(SignalingError),
}

/// The closed enumeration the signaling surface (`create_offer`,
/// `set_remote_description`, `add_ice_candidate`) returns. Kept distinct
/// from the internal packet-path [`Error`] per the propagation policy:
/// callers outside this crate only ever see these variants from signaling
/// calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingError {
    Ok,
    NoRemoteMedia,
    NoMatchingMediaType,
    VideoIncompatible,
    WrongSdpTypeOfferAfterOffer,
    DtlsFingerprintDigestNotSupported,
    DtlsFingerprintMissing,
    DataChannelTransportNotSupported,
    Error,
}
