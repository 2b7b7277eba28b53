//! The contract between the DTLS transport and the SRTP contexts it feeds keying
//! material into. Kept here, rather than in either crate, since both `rtc-dtls`
//! and `rtc-srtp` need the type without depending on each other.

/// One side's SRTP master key and salt, exported from a completed DTLS handshake.
#[derive(Clone)]
pub struct SrtpKeyingMaterial {
    pub key: Vec<u8>,
    pub salt: Vec<u8>,
}

/// Keying material for both directions of an SRTP session, split the way
/// `EXTRACTOR-dtls_srtp` (RFC 5764 §4.2) lays its output out: client material
/// first, then server material.
pub struct ExportedSrtpKeys {
    pub client: SrtpKeyingMaterial,
    pub server: SrtpKeyingMaterial,
}

/// Implemented by a completed DTLS session: exports keying material for the
/// SRTP/SRTCP contexts without exposing the handshake's internal secrets.
pub trait KeyingMaterialExporter {
    /// Exports `2 * (key_len + salt_len)` bytes of keying material under `label`
    /// and splits it into client/server key/salt per RFC 5764 §4.2.
    fn export_keying_material(
        &self,
        label: &str,
        key_len: usize,
        salt_len: usize,
    ) -> crate::error::Result<ExportedSrtpKeys>;
}
