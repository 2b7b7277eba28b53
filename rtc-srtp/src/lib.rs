//! SRTP/SRTCP per-SSRC crypto contexts (RFC 3711): AES-CM/F8 encryption,
//! HMAC-SHA1 authentication, keys derived from DTLS-exported keying material.

mod aes_cm;
mod cipher;
mod context;
mod error;
mod kdf;
mod replay;
mod transform;

pub use cipher::{AuthKind, CipherKind};
pub use context::{SrtcpContext, SrtpContext};
pub use error::{Error, Result};
pub use kdf::{derive_session_key, derive_session_keys, SessionKeys};
