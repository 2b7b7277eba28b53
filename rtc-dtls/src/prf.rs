//! TLS 1.2 PRF (RFC 5246 §5), the HMAC-SHA256 variant, used for the master
//! secret, the record key block, and keying material export (RFC 5705/5764).

use hmac::{Hmac, Mac};
use sha2::Sha256;

const SHA256_OUTPUT_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// `P_hash(secret, seed)`, truncated to `out_len` bytes.
fn p_hash(secret: &[u8], seed: &[u8], out_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len + SHA256_OUTPUT_LEN);
    let mut a = hmac_once(secret, seed);
    while out.len() < out_len {
        let mut input = a.clone();
        input.extend_from_slice(seed);
        out.extend_from_slice(&hmac_once(secret, &input));
        a = hmac_once(secret, &a);
    }
    out.truncate(out_len);
    out
}

fn hmac_once(secret: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn prf(secret: &[u8], label: &str, seed: &[u8], out_len: usize) -> Vec<u8> {
    let mut full_seed = Vec::with_capacity(label.len() + seed.len());
    full_seed.extend_from_slice(label.as_bytes());
    full_seed.extend_from_slice(seed);
    p_hash(secret, &full_seed, out_len)
}

/// `master_secret = PRF(pre_master_secret, "master secret", client_random || server_random, 48)`
pub fn master_secret(pre_master_secret: &[u8], client_random: &[u8; 32], server_random: &[u8; 32]) -> [u8; 48] {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    let bytes = prf(pre_master_secret, "master secret", &seed, 48);
    let mut out = [0u8; 48];
    out.copy_from_slice(&bytes);
    out
}

/// `verify_data = PRF(master_secret, label, Hash(handshake_messages), 12)`
pub fn finished_verify_data(master_secret: &[u8; 48], label: &str, transcript_hash: &[u8; 32]) -> [u8; 12] {
    let bytes = prf(master_secret, label, transcript_hash, 12);
    let mut out = [0u8; 12];
    out.copy_from_slice(&bytes);
    out
}

/// Exports keying material the way RFC 5705/5764 do: `PRF(master_secret, label,
/// client_random || server_random, length)`. Used both for SRTP key export and
/// (in principle) any other exporter label a future caller needs.
pub fn export_keying_material(
    master_secret: &[u8; 48],
    label: &str,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    length: usize,
) -> Vec<u8> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(master_secret, label, &seed, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_hash_is_deterministic_and_sized() {
        let a = p_hash(b"secret", b"seed", 100);
        let b = p_hash(b"secret", b"seed", 100);
        assert_eq!(a, b);
        assert_eq!(a.len(), 100);
    }

    #[test]
    fn different_labels_produce_different_output() {
        let cr = [1u8; 32];
        let sr = [2u8; 32];
        let ms = master_secret(b"pre-master", &cr, &sr);
        let a = export_keying_material(&ms, "EXTRACTOR-dtls_srtp", &cr, &sr, 60);
        let b = export_keying_material(&ms, "client finished", &cr, &sr, 60);
        assert_ne!(a, b);
    }

    #[test]
    fn master_secret_is_order_sensitive() {
        let cr = [1u8; 32];
        let sr = [2u8; 32];
        let a = master_secret(b"pms", &cr, &sr);
        let b = master_secret(b"pms", &sr, &cr);
        assert_ne!(a, b);
    }
}
