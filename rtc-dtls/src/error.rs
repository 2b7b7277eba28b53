use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("dtls: record too short")]
    ShortRecord,
    #[error("dtls: handshake message too short")]
    ShortHandshakeMessage,
    #[error("dtls: unexpected handshake message, wanted {wanted}, got {got}")]
    UnexpectedMessage { wanted: &'static str, got: u8 },
    #[error("dtls: peer sent a fatal alert")]
    AlertReceived,
    #[error("dtls: handshake timed out")]
    HandshakeTimeout,
    #[error("dtls: remote certificate fingerprint does not match the signaled value")]
    FingerprintMismatch,
    #[error("dtls: inbound queue closed")]
    QueueClosed,
    #[error("dtls: record authentication failed")]
    RecordAuthFailed,
    #[error("dtls: handshake already completed")]
    AlreadyComplete,
    #[error("dtls: keying material requested before handshake completed")]
    NotComplete,
    #[error("certificate generation failed: {0}")]
    CertGeneration(String),
}
