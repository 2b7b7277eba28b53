//! A self-signed certificate exists only to carry a fingerprint the remote
//! peer already has from the SDP; nothing here validates a chain of trust.

use ring::digest;

use crate::error::{Error, Result};

pub struct Certificate {
    pub der: Vec<u8>,
}

impl Certificate {
    /// Generates a fresh self-signed certificate for one peer connection's
    /// lifetime.
    pub fn generate_self_signed() -> Result<Self> {
        let rcgen::CertifiedKey { cert, .. } =
            rcgen::generate_simple_self_signed(["rtc.local".to_string()])
                .map_err(|e| Error::CertGeneration(e.to_string()))?;
        Ok(Certificate {
            der: cert.der().to_vec(),
        })
    }

    /// SHA-256 fingerprint, formatted as uppercase colon-separated hex the way
    /// SDP `a=fingerprint` lines carry it (RFC 8122).
    pub fn fingerprint(&self) -> String {
        format_fingerprint(digest::digest(&digest::SHA256, &self.der).as_ref())
    }
}

pub fn format_fingerprint(hash: &[u8]) -> String {
    hash.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Compares a locally computed fingerprint against the one signaled in SDP.
/// Case-insensitive per the spec's comparison rule (RFC 8122 values are
/// conventionally uppercase, but peers are not required to send them that way).
pub fn fingerprint_matches(computed: &str, signaled: &str) -> bool {
    computed.eq_ignore_ascii_case(signaled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_cert_has_stable_fingerprint() {
        let cert = Certificate::generate_self_signed().unwrap();
        let a = cert.fingerprint();
        let b = cert.fingerprint();
        assert_eq!(a, b);
        assert_eq!(a.split(':').count(), 32);
    }

    #[test]
    fn fingerprint_compare_is_case_insensitive() {
        assert!(fingerprint_matches("AA:BB:CC", "aa:bb:cc"));
        assert!(!fingerprint_matches("AA:BB:CC", "aa:bb:cd"));
    }
}
