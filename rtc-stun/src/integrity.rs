use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Computes short-term credential HMAC-SHA1 over `data`, keyed by the STUN
/// password (RFC 5389 §15.4). Short-term keys are the raw password bytes,
/// no SASLprep or realm/username mixing.
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> [u8; 20] {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 20];
    out.copy_from_slice(&result);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_key_is_deterministic() {
        let a = hmac_sha1(b"pwd", b"hello");
        let b = hmac_sha1(b"pwd", b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_differ() {
        let a = hmac_sha1(b"pwd1", b"hello");
        let b = hmac_sha1(b"pwd2", b"hello");
        assert_ne!(a, b);
    }
}
