//! Typed encode/decode helpers for the small set of attributes this crate's
//! callers (the ICE channel) actually use. Generic attribute storage and the
//! raw byte accessors live on [`crate::message::Message`]; this module just
//! saves callers from hand-rolling big-endian conversions.

use crate::error::{Error, Result};

pub fn encode_priority(priority: u32) -> Vec<u8> {
    priority.to_be_bytes().to_vec()
}

pub fn decode_priority(value: &[u8]) -> Result<u32> {
    if value.len() != 4 {
        return Err(Error::AttributeOverrun);
    }
    Ok(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
}

pub fn encode_tiebreaker(tiebreaker: u64) -> Vec<u8> {
    tiebreaker.to_be_bytes().to_vec()
}

pub fn decode_tiebreaker(value: &[u8]) -> Result<u64> {
    if value.len() != 8 {
        return Err(Error::AttributeOverrun);
    }
    let mut b = [0u8; 8];
    b.copy_from_slice(value);
    Ok(u64::from_be_bytes(b))
}

pub fn encode_username(remote_ufrag: &str, local_ufrag: &str) -> Vec<u8> {
    format!("{remote_ufrag}:{local_ufrag}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_roundtrip() {
        let encoded = encode_priority(0x7700_1234);
        assert_eq!(decode_priority(&encoded).unwrap(), 0x7700_1234);
    }

    #[test]
    fn tiebreaker_roundtrip() {
        let encoded = encode_tiebreaker(0xDEAD_BEEF_CAFE_0001);
        assert_eq!(decode_tiebreaker(&encoded).unwrap(), 0xDEAD_BEEF_CAFE_0001);
    }

    #[test]
    fn username_is_remote_colon_local() {
        assert_eq!(encode_username("wxyz", "abcd"), b"wxyz:abcd".to_vec());
    }
}
