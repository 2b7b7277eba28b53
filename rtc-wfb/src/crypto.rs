//! Link crypto (C10): a long-term X25519 identity derived from a shared bind
//! phrase, session-key rotation sealed under that identity, and the
//! per-frame AEAD transform keyed by the current session key.

use argon2::{Config, ThreadMode, Variant, Version};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, Payload};
use chacha20poly1305::{Key, Nonce, Tag, XChaCha20Poly1305};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// WFB links have no channel to exchange a salt over, so the bind phrase is
/// stretched with a fixed, publicly-known salt. Secrecy comes entirely from
/// the phrase; the salt only defeats rainbow tables against a leaked config.
const BIND_PHRASE_SALT: &[u8; 16] = b"rtc-wfb-bindsalt";

const ARGON2_MEM_COST_KIB: u32 = 65536;
const ARGON2_TIME_COST: u32 = 2;
const ARGON2_LANES: u32 = 1;

/// Announcement packet layout: `nonce(24) || ciphertext(32) || tag(16)`.
const SESSION_NONCE_LEN: usize = 24;
const SESSION_KEY_LEN: usize = 32;
const SESSION_TAG_LEN: usize = 16;
pub const SESSION_ANNOUNCEMENT_LEN: usize = SESSION_NONCE_LEN + SESSION_KEY_LEN + SESSION_TAG_LEN;

/// Derives the link's long-term X25519 keypair from a shared bind phrase.
///
/// Both ends of a link run this on the same phrase and end up with the same
/// keypair, so the "public key" never needs to travel out of band.
pub fn derive_identity(bind_phrase: &str) -> Result<StaticSecret> {
    let config = Config {
        variant: Variant::Argon2id,
        version: Version::Version13,
        mem_cost: ARGON2_MEM_COST_KIB,
        time_cost: ARGON2_TIME_COST,
        lanes: ARGON2_LANES,
        thread_mode: ThreadMode::Sequential,
        secret: &[],
        ad: &[],
        hash_length: 32,
    };
    let mut hash = argon2::hash_raw(bind_phrase.as_bytes(), BIND_PHRASE_SALT, &config)
        .map_err(|e| Error::KeyDerivation(e.to_string()))?;
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&hash);
    hash.zeroize();
    let secret = StaticSecret::from(key_bytes);
    key_bytes.zeroize();
    Ok(secret)
}

/// The key used to seal/open session-key announcement packets: a DH shared
/// secret between the two ends' identities, run through SHA-256 since a raw
/// X25519 output is not safe to use directly as a cipher key.
fn announcement_key(identity: &StaticSecret) -> Key {
    let public = PublicKey::from(identity);
    let shared = identity.diffie_hellman(&public);
    let digest = Sha256::digest(shared.as_bytes());
    *Key::from_slice(&digest)
}

/// An established WFB link: the long-term identity plus whatever session key
/// is currently active for data-frame transforms.
pub struct WfbSession {
    identity: StaticSecret,
    session_key: Option<[u8; SESSION_KEY_LEN]>,
}

impl Drop for WfbSession {
    fn drop(&mut self) {
        if let Some(mut key) = self.session_key.take() {
            key.zeroize();
        }
    }
}

impl WfbSession {
    pub fn new(bind_phrase: &str) -> Result<Self> {
        Ok(Self {
            identity: derive_identity(bind_phrase)?,
            session_key: None,
        })
    }

    pub fn has_session_key(&self) -> bool {
        self.session_key.is_some()
    }

    /// Generates a fresh random session key and seals it for transmission.
    /// The caller is responsible for sending the result as the payload of a
    /// frame on [`crate::frame::SESSION_KEY_MULTIPLEX_INDEX`].
    pub fn rotate_session_key(&mut self) -> Result<Vec<u8>> {
        let mut key = [0u8; SESSION_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        let sealed = self.seal_session_key(&key)?;
        self.session_key = Some(key);
        Ok(sealed)
    }

    fn seal_session_key(&self, key: &[u8; SESSION_KEY_LEN]) -> Result<Vec<u8>> {
        let cipher_key = announcement_key(&self.identity);
        let cipher = XChaCha20Poly1305::new(&cipher_key);
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, key.as_slice())
            .map_err(|_| Error::SessionKeySealInvalid)?;
        let mut out = Vec::with_capacity(SESSION_ANNOUNCEMENT_LEN);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Verifies and opens an incoming session-key announcement, replacing
    /// the active session key and resetting any downstream per-session
    /// state (dedup/FEC reassembly) the caller owns.
    pub fn open_session_key_announcement(&mut self, packet: &[u8]) -> Result<()> {
        if packet.len() != SESSION_ANNOUNCEMENT_LEN {
            return Err(Error::SessionKeySealInvalid);
        }
        let (nonce_bytes, rest) = packet.split_at(SESSION_NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher_key = announcement_key(&self.identity);
        let cipher = XChaCha20Poly1305::new(&cipher_key);
        let mut plaintext = cipher
            .decrypt(nonce, rest)
            .map_err(|_| Error::SessionKeySealInvalid)?;
        if plaintext.len() != SESSION_KEY_LEN {
            plaintext.zeroize();
            return Err(Error::SessionKeySealInvalid);
        }
        let mut key = [0u8; SESSION_KEY_LEN];
        key.copy_from_slice(&plaintext);
        plaintext.zeroize();
        self.session_key = Some(key);
        Ok(())
    }

    /// Encrypts one data-frame payload. `nonce` is the 64-bit value the
    /// frame classifier pulled out of the MAC address fields, zero-padded
    /// out to the cipher's 24-byte nonce.
    pub fn encrypt_frame(&self, nonce: u64, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = self.session_key.as_ref().ok_or(Error::NoSessionKey)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
        cipher
            .encrypt(&frame_nonce(nonce), plaintext)
            .map_err(|_| Error::AuthFailed)
    }

    pub fn decrypt_frame(&self, nonce: u64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let key = self.session_key.as_ref().ok_or(Error::NoSessionKey)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
        cipher
            .decrypt(&frame_nonce(nonce), ciphertext)
            .map_err(|_| Error::AuthFailed)
    }

    /// Computes the plain-MAC tag for an unencrypted data frame: a detached
    /// AEAD tag over the payload with no ciphertext, so the same session key
    /// authenticates the frame without hiding its contents.
    pub fn tag_frame(&self, nonce: u64, payload: &[u8]) -> Result<[u8; SESSION_TAG_LEN]> {
        let key = self.session_key.as_ref().ok_or(Error::NoSessionKey)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
        let tag = cipher
            .encrypt(
                &frame_nonce(nonce),
                Payload {
                    msg: &[],
                    aad: payload,
                },
            )
            .map_err(|_| Error::AuthFailed)?;
        let mut out = [0u8; SESSION_TAG_LEN];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    /// Verifies a plain-MAC tag produced by [`Self::tag_frame`].
    pub fn verify_frame_tag(&self, nonce: u64, payload: &[u8], tag: &[u8]) -> Result<()> {
        if tag.len() != SESSION_TAG_LEN {
            return Err(Error::AuthFailed);
        }
        let expected = self.tag_frame(nonce, payload)?;
        if expected.ct_eq(tag).into() {
            Ok(())
        } else {
            Err(Error::AuthFailed)
        }
    }
}

fn frame_nonce(nonce: u64) -> Nonce {
    let mut bytes = [0u8; 24];
    bytes[16..24].copy_from_slice(&nonce.to_be_bytes());
    *Nonce::from_slice(&bytes)
}

// `Tag` is re-exported for callers that want to name the announcement tag
// type explicitly; the crate itself only ever slices it out of a Vec.
#[allow(unused_imports)]
use Tag as _SessionTag;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_derivation_is_deterministic() {
        let a = derive_identity("correct horse battery staple").unwrap();
        let b = derive_identity("correct horse battery staple").unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn different_phrases_yield_different_identities() {
        let a = derive_identity("phrase one").unwrap();
        let b = derive_identity("phrase two").unwrap();
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn session_key_rotation_round_trips() {
        let mut tx = WfbSession::new("shared phrase").unwrap();
        let mut rx = WfbSession::new("shared phrase").unwrap();
        let announcement = tx.rotate_session_key().unwrap();
        assert_eq!(announcement.len(), SESSION_ANNOUNCEMENT_LEN);
        rx.open_session_key_announcement(&announcement).unwrap();

        let ciphertext = tx.encrypt_frame(42, b"hello radio").unwrap();
        let plaintext = rx.decrypt_frame(42, &ciphertext).unwrap();
        assert_eq!(plaintext, b"hello radio");
    }

    #[test]
    fn announcement_under_a_different_identity_is_rejected() {
        let mut tx = WfbSession::new("phrase a").unwrap();
        let mut rx = WfbSession::new("phrase b").unwrap();
        let announcement = tx.rotate_session_key().unwrap();
        assert!(rx.open_session_key_announcement(&announcement).is_err());
    }

    #[test]
    fn plain_mac_path_authenticates_without_hiding_payload() {
        let mut tx = WfbSession::new("shared phrase").unwrap();
        let rx_announcement = tx.rotate_session_key().unwrap();
        let mut rx = WfbSession::new("shared phrase").unwrap();
        rx.open_session_key_announcement(&rx_announcement).unwrap();

        let payload = b"plaintext telemetry";
        let tag = tx.tag_frame(7, payload).unwrap();
        rx.verify_frame_tag(7, payload, &tag).unwrap();

        let mut tampered = payload.to_vec();
        tampered[0] ^= 1;
        assert!(rx.verify_frame_tag(7, &tampered, &tag).is_err());
    }

    #[test]
    fn decrypt_before_session_key_established_fails() {
        let rx = WfbSession::new("shared phrase").unwrap();
        assert_eq!(rx.decrypt_frame(1, b"anything").unwrap_err(), Error::NoSessionKey);
    }
}
