use crc::{Crc, CRC_32_ISO_HDLC};

const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// FINGERPRINT attribute value (RFC 5389 §15.5): CRC-32 of the message XORed
/// with `0x5354554e` ("STUN" in ASCII, bitwise).
pub fn compute(data: &[u8]) -> u32 {
    CASTAGNOLI.checksum(data) ^ 0x5354_554e
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(compute(b"hello world"), compute(b"hello world"));
        assert_ne!(compute(b"hello world"), compute(b"hello worlD"));
    }
}
