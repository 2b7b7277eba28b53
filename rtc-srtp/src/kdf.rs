//! SRTP key derivation function (RFC 3711 §4.3.1): turns one master key/salt
//! pair into the session encryption, authentication and salting keys.

use crate::aes_cm;
use crate::error::Result;

pub const LABEL_ENCRYPTION: u8 = 0x00;
pub const LABEL_AUTHENTICATION: u8 = 0x01;
pub const LABEL_SALTING: u8 = 0x02;

/// Auth key length for HMAC-SHA1 (RFC 3711 default, 160 bits).
pub const AUTH_KEY_LENGTH: usize = 20;

/// `PRF(master_key, label)`: with key derivation rate 0 (the only rate this
/// crate supports), `index / kdr` is always 0, so only the label byte ever
/// perturbs the master salt.
pub fn derive_session_key(master_key: &[u8], master_salt: &[u8; 14], label: u8, out_len: usize) -> Result<Vec<u8>> {
    let mut iv = [0u8; 16];
    iv[..14].copy_from_slice(master_salt);
    iv[7] ^= label;
    aes_cm::keystream_block(master_key, &iv, out_len)
}

pub struct SessionKeys {
    pub encryption: Vec<u8>,
    pub authentication: Vec<u8>,
    pub salt: Vec<u8>,
}

impl Drop for SessionKeys {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.encryption.zeroize();
        self.authentication.zeroize();
        self.salt.zeroize();
    }
}

pub fn derive_session_keys(
    master_key: &[u8],
    master_salt: &[u8; 14],
    cipher_key_len: usize,
    salt_len: usize,
) -> Result<SessionKeys> {
    Ok(SessionKeys {
        encryption: derive_session_key(master_key, master_salt, LABEL_ENCRYPTION, cipher_key_len)?,
        authentication: derive_session_key(master_key, master_salt, LABEL_AUTHENTICATION, AUTH_KEY_LENGTH)?,
        salt: derive_session_key(master_key, master_salt, LABEL_SALTING, salt_len)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_produce_independent_keys() {
        let key = [5u8; 16];
        let salt = [6u8; 14];
        let keys = derive_session_keys(&key, &salt, 16, 14).unwrap();
        assert_ne!(keys.encryption, keys.authentication[..16]);
        assert_ne!(keys.encryption, keys.salt);
        assert_eq!(keys.encryption.len(), 16);
        assert_eq!(keys.authentication.len(), AUTH_KEY_LENGTH);
        assert_eq!(keys.salt.len(), 14);
    }

    #[test]
    fn derivation_is_deterministic() {
        let key = [5u8; 16];
        let salt = [6u8; 14];
        let a = derive_session_keys(&key, &salt, 16, 14).unwrap();
        let b = derive_session_keys(&key, &salt, 16, 14).unwrap();
        assert_eq!(a.encryption, b.encryption);
    }
}
