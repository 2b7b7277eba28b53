//! Per-SSRC SRTP and SRTCP crypto contexts (RFC 3711 §3.2/§3.4).

use byteorder::{BigEndian, ByteOrder};
use subtle::ConstantTimeEq;

use crate::cipher::{AuthKind, CipherKind};
use crate::error::{Error, Result};
use crate::kdf::{self, SessionKeys};
use crate::{aes_cm, transform};

const RTP_HEADER_LENGTH: usize = 12;
const RTCP_HEADER_LENGTH: usize = 8;

fn payload_offset(packet: &[u8]) -> Result<usize> {
    if packet.len() < RTP_HEADER_LENGTH {
        return Err(Error::ShortPacket);
    }
    let cc = (packet[0] & 0x0F) as usize;
    let mut offset = RTP_HEADER_LENGTH + cc * 4;
    if offset > packet.len() {
        return Err(Error::ShortPacket);
    }
    if packet[0] & 0x10 != 0 {
        if offset + 4 > packet.len() {
            return Err(Error::ShortPacket);
        }
        let ext_len_words = BigEndian::read_u16(&packet[offset + 2..offset + 4]) as usize;
        offset += 4 + ext_len_words * 4;
        if offset > packet.len() {
            return Err(Error::ShortPacket);
        }
    }
    Ok(offset)
}

/// An SRTP crypto context for one SSRC. Master key material is kept so a
/// sibling context for a new SSRC can be derived cheaply via [`SrtpContext::derive_for_ssrc`]
/// without re-running the DTLS exporter.
pub struct SrtpContext {
    ssrc: u32,
    cipher: CipherKind,
    auth: AuthKind,
    auth_tag_length: usize,
    master_key: Vec<u8>,
    master_salt: [u8; 14],
    session_keys: Option<SessionKeys>,
    roc: u32,
    last_seq: Option<u16>,
}

impl SrtpContext {
    pub fn new(
        ssrc: u32,
        cipher: CipherKind,
        auth: AuthKind,
        auth_tag_length: usize,
        master_key: Vec<u8>,
        master_salt: [u8; 14],
    ) -> Result<Self> {
        cipher.check_supported()?;
        auth.check_supported()?;
        if master_key.len() != cipher.key_len() {
            return Err(Error::BadKeyLength);
        }
        Ok(SrtpContext {
            ssrc,
            cipher,
            auth,
            auth_tag_length,
            master_key,
            master_salt,
            session_keys: None,
            roc: 0,
            last_seq: None,
        })
    }
}

impl Drop for SrtpContext {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.master_key.zeroize();
        self.master_salt.zeroize();
    }
}

impl SrtpContext {
    /// Derives a sibling context for a different SSRC, sharing this context's
    /// master material. Session keys are cleared and regenerated lazily
    /// before the new context's first use.
    pub fn derive_for_ssrc(&self, ssrc: u32) -> Self {
        SrtpContext {
            ssrc,
            cipher: self.cipher,
            auth: self.auth,
            auth_tag_length: self.auth_tag_length,
            master_key: self.master_key.clone(),
            master_salt: self.master_salt,
            session_keys: None,
            roc: 0,
            last_seq: None,
        }
    }

    fn session_keys(&mut self) -> Result<&SessionKeys> {
        if self.session_keys.is_none() {
            let keys = kdf::derive_session_keys(
                &self.master_key,
                &self.master_salt,
                self.cipher.key_len(),
                self.cipher.salt_len(),
            )?;
            self.session_keys = Some(keys);
        }
        Ok(self.session_keys.as_ref().unwrap())
    }

    fn update_roc(&mut self, seq_num: u16) {
        if self.last_seq.is_some() && seq_num == 0 {
            self.roc = self.roc.wrapping_add(1);
        }
        self.last_seq = Some(seq_num);
    }

    /// Encrypts the payload in place and appends the auth tag.
    pub fn transform_packet(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        let offset = payload_offset(packet)?;
        let seq_num = BigEndian::read_u16(&packet[2..4]);
        self.update_roc(seq_num);
        let roc = self.roc;
        let index48 = ((roc as u64) << 16) | seq_num as u64;

        let salt = self.session_keys()?.salt.clone();
        let key = self.session_keys()?.encryption.clone();
        let auth_key = self.session_keys()?.authentication.clone();

        if self.cipher.is_f8() {
            let header = packet[..RTP_HEADER_LENGTH].to_vec();
            let iv = transform::f8_iv(&header, roc);
            aes_cm::xor_keystream(&key, &iv, &mut packet[offset..])?;
        } else {
            let iv = transform::aes_cm_iv(&salt, self.ssrc, index48);
            aes_cm::xor_keystream(&key, &iv, &mut packet[offset..])?;
        }

        let tag = transform::compute_auth_tag(&auth_key, packet, roc, self.auth_tag_length);
        packet.extend_from_slice(&tag);
        Ok(())
    }

    /// Verifies the auth tag, strips it, and decrypts the payload in place.
    pub fn reverse_transform_packet(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        if packet.len() < self.auth_tag_length {
            return Err(Error::ShortPacket);
        }
        let body_len = packet.len() - self.auth_tag_length;
        let seq_num = BigEndian::read_u16(&packet[2..4]);
        self.update_roc(seq_num);
        let roc = self.roc;
        let index48 = ((roc as u64) << 16) | seq_num as u64;

        let auth_key = self.session_keys()?.authentication.clone();
        let expected = transform::compute_auth_tag(&auth_key, &packet[..body_len], roc, self.auth_tag_length);
        if expected.ct_eq(&packet[body_len..]).unwrap_u8() != 1 {
            return Err(Error::AuthFailed);
        }

        packet.truncate(body_len);
        let offset = payload_offset(packet)?;
        let key = self.session_keys()?.encryption.clone();
        if self.cipher.is_f8() {
            let header = packet[..RTP_HEADER_LENGTH].to_vec();
            let iv = transform::f8_iv(&header, roc);
            aes_cm::xor_keystream(&key, &iv, &mut packet[offset..])?;
        } else {
            let salt = self.session_keys()?.salt.clone();
            let iv = transform::aes_cm_iv(&salt, self.ssrc, index48);
            aes_cm::xor_keystream(&key, &iv, &mut packet[offset..])?;
        }
        Ok(())
    }
}

/// An SRTCP crypto context for one SSRC. Unlike SRTP, the crypto index is
/// carried explicitly in the packet (the trailing 4 bytes before the auth
/// tag), not implied by a rolled-over sequence number, and incoming packets
/// are checked against a replay window.
pub struct SrtcpContext {
    ssrc: u32,
    cipher: CipherKind,
    auth: AuthKind,
    auth_tag_length: usize,
    master_key: Vec<u8>,
    master_salt: [u8; 14],
    session_keys: Option<SessionKeys>,
    replay: crate::replay::ReplayWindow,
}

impl SrtcpContext {
    pub fn new(
        ssrc: u32,
        cipher: CipherKind,
        auth: AuthKind,
        auth_tag_length: usize,
        master_key: Vec<u8>,
        master_salt: [u8; 14],
    ) -> Result<Self> {
        cipher.check_supported()?;
        auth.check_supported()?;
        if master_key.len() != cipher.key_len() {
            return Err(Error::BadKeyLength);
        }
        Ok(SrtcpContext {
            ssrc,
            cipher,
            auth,
            auth_tag_length,
            master_key,
            master_salt,
            session_keys: None,
            replay: crate::replay::ReplayWindow::new(),
        })
    }
}

impl Drop for SrtcpContext {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.master_key.zeroize();
        self.master_salt.zeroize();
    }
}

impl SrtcpContext {
    fn session_keys(&mut self) -> Result<&SessionKeys> {
        if self.session_keys.is_none() {
            let keys = kdf::derive_session_keys(
                &self.master_key,
                &self.master_salt,
                self.cipher.key_len(),
                self.cipher.salt_len(),
            )?;
            self.session_keys = Some(keys);
        }
        Ok(self.session_keys.as_ref().unwrap())
    }

    /// Verifies, replay-checks, and (if encrypted) decrypts an incoming SRTCP
    /// packet in place, leaving a plain RTCP packet behind.
    pub fn reverse_transform_packet(&mut self, packet: &mut Vec<u8>) -> Result<()> {
        if packet.len() < RTCP_HEADER_LENGTH + 4 + self.auth_tag_length {
            return Err(Error::ShortPacket);
        }
        let body_len = packet.len() - self.auth_tag_length;
        let index_field = BigEndian::read_u32(&packet[body_len - 4..body_len]);
        let encrypted = index_field & 0x8000_0000 != 0;
        let index = (index_field & 0x7FFF_FFFF) as u64;

        let auth_key = self.session_keys()?.authentication.clone();
        let expected = transform::compute_auth_tag(&auth_key, &packet[..body_len], 0, self.auth_tag_length);
        if expected.ct_eq(&packet[body_len..]).unwrap_u8() != 1 {
            return Err(Error::AuthFailed);
        }

        if !self.replay.check_and_update(index) {
            return Err(Error::Replayed);
        }

        let rtcp_len = body_len - 4;
        packet.truncate(rtcp_len);

        if encrypted {
            let ssrc = BigEndian::read_u32(&packet[4..8]);
            let key = self.session_keys()?.encryption.clone();
            let salt = self.session_keys()?.salt.clone();
            let iv = transform::aes_cm_iv(&salt, ssrc, index);
            aes_cm::xor_keystream(&key, &iv, &mut packet[RTCP_HEADER_LENGTH..])?;
        }
        Ok(())
    }

    /// Encrypts (if configured) and authenticates an outgoing SRTCP packet,
    /// appending the index field and auth tag.
    pub fn transform_packet(&mut self, packet: &mut Vec<u8>, index: u32, encrypt: bool) -> Result<()> {
        if encrypt {
            let key = self.session_keys()?.encryption.clone();
            let salt = self.session_keys()?.salt.clone();
            let iv = transform::aes_cm_iv(&salt, self.ssrc, index as u64);
            aes_cm::xor_keystream(&key, &iv, &mut packet[RTCP_HEADER_LENGTH..])?;
        }
        let mut index_field = index & 0x7FFF_FFFF;
        if encrypt {
            index_field |= 0x8000_0000;
        }
        let mut index_bytes = [0u8; 4];
        BigEndian::write_u32(&mut index_bytes, index_field);
        packet.extend_from_slice(&index_bytes);

        let auth_key = self.session_keys()?.authentication.clone();
        let tag = transform::compute_auth_tag(&auth_key, packet, 0, self.auth_tag_length);
        packet.extend_from_slice(&tag);
        Ok(())
    }
}
