//! DTLS 1.2 record layer (RFC 6347 §4.1): a 13-byte header in front of every
//! datagram's content, carrying the epoch and a 48-bit sequence number instead
//! of TLS's implicit stream offset.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

pub const RECORD_HEADER_LENGTH: usize = 13;

/// `{254, 253}` is DTLS 1.2's on-the-wire version (the one's-complement of TLS 1.2).
pub const DTLS_1_2: (u8, u8) = (254, 253);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    fn from_u8(b: u8) -> Option<Self> {
        match b {
            20 => Some(ContentType::ChangeCipherSpec),
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub epoch: u16,
    pub sequence_number: u64,
    pub length: u16,
}

impl RecordHeader {
    pub fn marshal(&self, dst: &mut [u8]) {
        dst[0] = self.content_type as u8;
        dst[1] = DTLS_1_2.0;
        dst[2] = DTLS_1_2.1;
        BigEndian::write_u16(&mut dst[3..5], self.epoch);
        // 48-bit sequence number.
        dst[5] = (self.sequence_number >> 40) as u8;
        dst[6] = (self.sequence_number >> 32) as u8;
        BigEndian::write_u32(&mut dst[7..11], self.sequence_number as u32);
        BigEndian::write_u16(&mut dst[11..13], self.length);
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() < RECORD_HEADER_LENGTH {
            return Err(Error::ShortRecord);
        }
        let content_type = ContentType::from_u8(buf[0]).ok_or(Error::ShortRecord)?;
        let epoch = BigEndian::read_u16(&buf[3..5]);
        let sequence_number = ((buf[5] as u64) << 40)
            | ((buf[6] as u64) << 32)
            | (BigEndian::read_u32(&buf[7..11]) as u64);
        let length = BigEndian::read_u16(&buf[11..13]);
        Ok(RecordHeader {
            content_type,
            epoch,
            sequence_number,
            length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let hdr = RecordHeader {
            content_type: ContentType::Handshake,
            epoch: 1,
            sequence_number: 0x0001_0203_0405,
            length: 42,
        };
        let mut buf = [0u8; RECORD_HEADER_LENGTH];
        hdr.marshal(&mut buf);
        assert_eq!(buf[1..3], [DTLS_1_2.0, DTLS_1_2.1]);
        let back = RecordHeader::unmarshal(&buf).unwrap();
        assert_eq!(back, hdr);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let buf = [0u8; 4];
        assert_eq!(RecordHeader::unmarshal(&buf).unwrap_err(), Error::ShortRecord);
    }
}
