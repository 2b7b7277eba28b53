use crate::error::{Error, Result};

pub const MAGIC_COOKIE: u32 = 0x2112_A442;
pub const HEADER_LENGTH: usize = 20;
pub const TRANSACTION_ID_LENGTH: usize = 12;
pub const ATTRIBUTE_HEADER_LENGTH: usize = 4;

/// A STUN transaction id: 12 bytes, unique per request (RFC 5389 §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub [u8; TRANSACTION_ID_LENGTH]);

impl TransactionId {
    pub fn new() -> Self {
        use rand::RngCore;
        let mut id = [0u8; TRANSACTION_ID_LENGTH];
        rand::rng().fill_bytes(&mut id);
        TransactionId(id)
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Request,
    Indication,
    SuccessResponse,
    ErrorResponse,
}

/// A STUN message type: a 16-bit field split into a 12-bit method and a 2-bit class
/// (RFC 5389 §6), with the class bits interleaved at positions 4 and 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageType {
    pub method: u16,
    pub class: MessageClass,
}

impl MessageType {
    pub const BINDING_REQUEST: MessageType = MessageType {
        method: METHOD_BINDING,
        class: MessageClass::Request,
    };
    pub const BINDING_SUCCESS_RESPONSE: MessageType = MessageType {
        method: METHOD_BINDING,
        class: MessageClass::SuccessResponse,
    };
    pub const BINDING_ERROR_RESPONSE: MessageType = MessageType {
        method: METHOD_BINDING,
        class: MessageClass::ErrorResponse,
    };

    pub fn to_bits(self) -> u16 {
        let (c1, c0): (u16, u16) = match self.class {
            MessageClass::Request => (0, 0),
            MessageClass::Indication => (0, 1),
            MessageClass::SuccessResponse => (1, 0),
            MessageClass::ErrorResponse => (1, 1),
        };
        let m = self.method;
        let m_low = m & 0x000F;
        let m_mid = (m >> 4) & 0x0007;
        let m_high = (m >> 7) & 0x001F;
        (m_high << 9) | (c1 << 8) | (m_mid << 5) | (c0 << 4) | m_low
    }

    pub fn from_bits(bits: u16) -> Self {
        let m_high = (bits >> 9) & 0x001F;
        let c1 = (bits >> 8) & 0x1;
        let m_mid = (bits >> 5) & 0x0007;
        let c0 = (bits >> 4) & 0x1;
        let m_low = bits & 0x000F;
        let method = (m_high << 7) | (m_mid << 4) | m_low;
        let class = match (c1, c0) {
            (0, 0) => MessageClass::Request,
            (0, 1) => MessageClass::Indication,
            (1, 0) => MessageClass::SuccessResponse,
            (1, 1) => MessageClass::ErrorResponse,
            _ => unreachable!(),
        };
        MessageType { method, class }
    }
}

pub const METHOD_BINDING: u16 = 0x0001;

pub const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
pub const ATTR_USERNAME: u16 = 0x0006;
pub const ATTR_MESSAGE_INTEGRITY: u16 = 0x0008;
pub const ATTR_ERROR_CODE: u16 = 0x0009;
pub const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
pub const ATTR_PRIORITY: u16 = 0x0024;
pub const ATTR_USE_CANDIDATE: u16 = 0x0025;
pub const ATTR_FINGERPRINT: u16 = 0x8028;
pub const ATTR_ICE_CONTROLLED: u16 = 0x8029;
pub const ATTR_ICE_CONTROLLING: u16 = 0x802A;

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// A decoded or in-construction STUN message: header fields plus an ordered
/// list of raw (type, value) attributes.
#[derive(Debug, Clone)]
pub struct Message {
    pub typ: MessageType,
    pub transaction_id: TransactionId,
    attributes: Vec<(u16, Vec<u8>)>,
    raw: Vec<u8>,
}

impl Message {
    pub fn new(typ: MessageType, transaction_id: TransactionId) -> Self {
        Message {
            typ,
            transaction_id,
            attributes: Vec::new(),
            raw: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, attr_type: u16, value: &[u8]) {
        self.attributes.push((attr_type, value.to_vec()));
    }

    pub fn get_attribute(&self, attr_type: u16) -> Option<&[u8]> {
        self.attributes
            .iter()
            .find(|(t, _)| *t == attr_type)
            .map(|(_, v)| v.as_slice())
    }

    fn encode_header_and_attrs(&self, length: u16) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LENGTH + length as usize);
        buf.extend_from_slice(&self.typ.to_bits().to_be_bytes());
        buf.extend_from_slice(&length.to_be_bytes());
        buf.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        buf.extend_from_slice(&self.transaction_id.0);
        for (t, v) in &self.attributes {
            buf.extend_from_slice(&t.to_be_bytes());
            buf.extend_from_slice(&(v.len() as u16).to_be_bytes());
            buf.extend_from_slice(v);
            let pad = padded_len(v.len()) - v.len();
            buf.extend(std::iter::repeat(0u8).take(pad));
        }
        buf
    }

    fn attrs_len(&self) -> usize {
        self.attributes
            .iter()
            .map(|(_, v)| ATTRIBUTE_HEADER_LENGTH + padded_len(v.len()))
            .sum()
    }

    /// Serializes the message as-is, with no MESSAGE-INTEGRITY or FINGERPRINT.
    pub fn encode(&self) -> Vec<u8> {
        self.encode_header_and_attrs(self.attrs_len() as u16)
    }

    /// Serializes the message, appending MESSAGE-INTEGRITY (HMAC-SHA1 keyed by
    /// `key`, RFC 5389 §15.4) and, if `fingerprint` is set, a FINGERPRINT
    /// attribute (RFC 5389 §15.5) after it.
    pub fn encode_with_integrity(&self, key: &[u8], fingerprint: bool) -> Vec<u8> {
        let before_len = self.attrs_len();
        let length_with_integrity = (before_len + ATTRIBUTE_HEADER_LENGTH + 20) as u16;
        let mut buf = self.encode_header_and_attrs(length_with_integrity);

        let hmac = crate::integrity::hmac_sha1(key, &buf);
        buf.extend_from_slice(&ATTR_MESSAGE_INTEGRITY.to_be_bytes());
        buf.extend_from_slice(&20u16.to_be_bytes());
        buf.extend_from_slice(&hmac);

        if fingerprint {
            let length_with_fp =
                length_with_integrity + (ATTRIBUTE_HEADER_LENGTH + 4) as u16;
            buf[2..4].copy_from_slice(&length_with_fp.to_be_bytes());
            let crc = crate::fingerprint::compute(&buf);
            buf.extend_from_slice(&ATTR_FINGERPRINT.to_be_bytes());
            buf.extend_from_slice(&4u16.to_be_bytes());
            buf.extend_from_slice(&crc.to_be_bytes());
        }

        buf
    }

    /// Parses a STUN message from the front of `buf`. Retains the raw bytes for
    /// later integrity/fingerprint verification.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LENGTH {
            return Err(Error::ShortHeader);
        }
        let type_bits = u16::from_be_bytes([buf[0], buf[1]]);
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if cookie != MAGIC_COOKIE {
            return Err(Error::BadMagicCookie);
        }
        if length % 4 != 0 {
            return Err(Error::UnalignedLength);
        }
        if buf.len() < HEADER_LENGTH + length {
            return Err(Error::LengthOverrun);
        }

        let mut transaction_id = [0u8; TRANSACTION_ID_LENGTH];
        transaction_id.copy_from_slice(&buf[8..20]);

        let mut attributes = Vec::new();
        let mut offset = HEADER_LENGTH;
        let end = HEADER_LENGTH + length;
        while offset + ATTRIBUTE_HEADER_LENGTH <= end {
            let attr_type = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            let attr_len = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
            offset += ATTRIBUTE_HEADER_LENGTH;
            if offset + attr_len > end {
                return Err(Error::AttributeOverrun);
            }
            attributes.push((attr_type, buf[offset..offset + attr_len].to_vec()));
            offset += padded_len(attr_len);
        }

        Ok(Message {
            typ: MessageType::from_bits(type_bits),
            transaction_id: TransactionId(transaction_id),
            attributes,
            raw: buf[..HEADER_LENGTH + length].to_vec(),
        })
    }

    /// Verifies a MESSAGE-INTEGRITY attribute against `key`, recomputing the
    /// HMAC over the message prefix with the length field temporarily set to
    /// end at the integrity attribute (RFC 5389 §15.4).
    pub fn check_integrity(&self, key: &[u8]) -> Result<()> {
        let integrity = self
            .get_attribute(ATTR_MESSAGE_INTEGRITY)
            .ok_or(Error::AttributeNotFound(ATTR_MESSAGE_INTEGRITY))?;
        if integrity.len() != 20 {
            return Err(Error::BadIntegrityLength);
        }

        let attr_offset = self
            .find_attribute_offset(ATTR_MESSAGE_INTEGRITY)
            .ok_or(Error::AttributeNotFound(ATTR_MESSAGE_INTEGRITY))?;

        let before_len = attr_offset - HEADER_LENGTH;
        let temp_length = (before_len + ATTRIBUTE_HEADER_LENGTH + 20) as u16;
        let mut hash_input = self.raw[..attr_offset].to_vec();
        hash_input[2..4].copy_from_slice(&temp_length.to_be_bytes());

        let expected = crate::integrity::hmac_sha1(key, &hash_input);
        if subtle::ConstantTimeEq::ct_eq(expected.as_slice(), integrity).into() {
            Ok(())
        } else {
            Err(Error::IntegrityMismatch)
        }
    }

    /// Verifies the FINGERPRINT attribute, if present.
    pub fn check_fingerprint(&self) -> Result<()> {
        let fp = self
            .get_attribute(ATTR_FINGERPRINT)
            .ok_or(Error::AttributeNotFound(ATTR_FINGERPRINT))?;
        if fp.len() != 4 {
            return Err(Error::FingerprintMismatch);
        }
        let attr_offset = self
            .find_attribute_offset(ATTR_FINGERPRINT)
            .ok_or(Error::AttributeNotFound(ATTR_FINGERPRINT))?;
        let computed = crate::fingerprint::compute(&self.raw[..attr_offset]);
        if computed.to_be_bytes() == fp {
            Ok(())
        } else {
            Err(Error::FingerprintMismatch)
        }
    }

    fn find_attribute_offset(&self, attr_type: u16) -> Option<usize> {
        let mut offset = HEADER_LENGTH;
        for (t, v) in &self.attributes {
            if *t == attr_type {
                return Some(offset + ATTRIBUTE_HEADER_LENGTH);
            }
            offset += ATTRIBUTE_HEADER_LENGTH + padded_len(v.len());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_bit_roundtrip() {
        for mt in [
            MessageType::BINDING_REQUEST,
            MessageType::BINDING_SUCCESS_RESPONSE,
            MessageType::BINDING_ERROR_RESPONSE,
        ] {
            assert_eq!(MessageType::from_bits(mt.to_bits()), mt);
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut msg = Message::new(MessageType::BINDING_REQUEST, TransactionId::new());
        msg.add_attribute(ATTR_USERNAME, b"abcd:wxyz");
        msg.add_attribute(ATTR_PRIORITY, &12345u32.to_be_bytes());

        let buf = msg.encode();
        let decoded = Message::decode(&buf).unwrap();
        assert_eq!(decoded.typ, MessageType::BINDING_REQUEST);
        assert_eq!(decoded.get_attribute(ATTR_USERNAME), Some(&b"abcd:wxyz"[..]));
        assert_eq!(
            decoded.get_attribute(ATTR_PRIORITY),
            Some(&12345u32.to_be_bytes()[..])
        );
    }

    #[test]
    fn integrity_roundtrip_passes_with_correct_key() {
        let mut msg = Message::new(MessageType::BINDING_REQUEST, TransactionId::new());
        msg.add_attribute(ATTR_USERNAME, b"abcd:wxyz");
        let buf = msg.encode_with_integrity(b"remote_password_24_chars_", false);
        let decoded = Message::decode(&buf).unwrap();
        decoded
            .check_integrity(b"remote_password_24_chars_")
            .unwrap();
    }

    #[test]
    fn integrity_fails_with_wrong_key() {
        let mut msg = Message::new(MessageType::BINDING_REQUEST, TransactionId::new());
        msg.add_attribute(ATTR_USERNAME, b"abcd:wxyz");
        let buf = msg.encode_with_integrity(b"correct-key", false);
        let decoded = Message::decode(&buf).unwrap();
        assert_eq!(
            decoded.check_integrity(b"wrong-key").unwrap_err(),
            Error::IntegrityMismatch
        );
    }

    #[test]
    fn fingerprint_roundtrip() {
        let mut msg = Message::new(MessageType::BINDING_REQUEST, TransactionId::new());
        msg.add_attribute(ATTR_USE_CANDIDATE, &[]);
        let buf = msg.encode_with_integrity(b"pwd", true);
        let decoded = Message::decode(&buf).unwrap();
        decoded.check_integrity(b"pwd").unwrap();
        decoded.check_fingerprint().unwrap();
    }

    #[test]
    fn short_header_is_rejected() {
        assert_eq!(Message::decode(&[0u8; 10]).unwrap_err(), Error::ShortHeader);
    }

    #[test]
    fn bad_magic_cookie_is_rejected() {
        let mut buf = vec![0u8; 20];
        buf[0..2].copy_from_slice(&MessageType::BINDING_REQUEST.to_bits().to_be_bytes());
        assert_eq!(Message::decode(&buf).unwrap_err(), Error::BadMagicCookie);
    }
}
