//! Per-direction AEAD record protection (RFC 7905: ChaCha20-Poly1305 for TLS,
//! adapted to DTLS's epoch+sequence record layer).

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::error::{Error, Result};
use crate::record::ContentType;

pub struct DirectionKeys {
    cipher: ChaCha20Poly1305,
    static_iv: [u8; 12],
}

impl DirectionKeys {
    pub fn new(write_key: &[u8], write_iv: &[u8; 12]) -> Self {
        let key = Key::from_slice(write_key);
        DirectionKeys {
            cipher: ChaCha20Poly1305::new(key),
            static_iv: *write_iv,
        }
    }

    fn nonce(&self, epoch: u16, sequence_number: u64) -> Nonce {
        let mut n = self.static_iv;
        let seq_bytes = [
            (epoch >> 8) as u8,
            epoch as u8,
            (sequence_number >> 40) as u8,
            (sequence_number >> 32) as u8,
            (sequence_number >> 24) as u8,
            (sequence_number >> 16) as u8,
            (sequence_number >> 8) as u8,
            sequence_number as u8,
        ];
        for (i, b) in seq_bytes.iter().enumerate() {
            n[4 + i] ^= b;
        }
        *Nonce::from_slice(&n)
    }

    fn aad(content_type: ContentType, epoch: u16, sequence_number: u64, plaintext_len: usize) -> [u8; 13] {
        let mut aad = [0u8; 13];
        aad[0] = (epoch >> 8) as u8;
        aad[1] = epoch as u8;
        aad[2] = (sequence_number >> 40) as u8;
        aad[3] = (sequence_number >> 32) as u8;
        aad[4] = (sequence_number >> 24) as u8;
        aad[5] = (sequence_number >> 16) as u8;
        aad[6] = (sequence_number >> 8) as u8;
        aad[7] = sequence_number as u8;
        aad[8] = content_type as u8;
        aad[9] = crate::record::DTLS_1_2.0;
        aad[10] = crate::record::DTLS_1_2.1;
        aad[11] = (plaintext_len >> 8) as u8;
        aad[12] = plaintext_len as u8;
        aad
    }

    pub fn seal(
        &self,
        content_type: ContentType,
        epoch: u16,
        sequence_number: u64,
        plaintext: &[u8],
    ) -> Vec<u8> {
        let nonce = self.nonce(epoch, sequence_number);
        let aad = Self::aad(content_type, epoch, sequence_number, plaintext.len());
        self.cipher
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: &aad,
                },
            )
            .expect("chacha20poly1305 encryption does not fail")
    }

    pub fn open(
        &self,
        content_type: ContentType,
        epoch: u16,
        sequence_number: u64,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let plaintext_len = ciphertext.len().saturating_sub(16);
        let nonce = self.nonce(epoch, sequence_number);
        let aad = Self::aad(content_type, epoch, sequence_number, plaintext_len);
        self.cipher
            .decrypt(
                &nonce,
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| Error::RecordAuthFailed)
    }
}
