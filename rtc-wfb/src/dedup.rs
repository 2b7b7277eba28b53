//! No-FEC dedup stream (C12): sequence-number-keyed duplicate suppression
//! across redundant radios.

use std::collections::HashSet;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

const SEQ_HEADER_LEN: usize = 8;
const CLEAR_THRESHOLD: usize = 99;

pub struct DedupStream {
    seen: HashSet<u64>,
    first_packet: bool,
}

impl Default for DedupStream {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupStream {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
            first_packet: true,
        }
    }

    /// Feeds one `[8-byte LE seq || payload]` frame. Returns the payload if
    /// it hasn't been seen in the current window, `None` if it's a
    /// duplicate.
    pub fn add_frame<'a>(&mut self, frame: &'a [u8]) -> Result<Option<&'a [u8]>> {
        if frame.len() < SEQ_HEADER_LEN {
            return Err(Error::ShortHeader);
        }
        let seq = LittleEndian::read_u64(&frame[0..8]);
        let payload = &frame[SEQ_HEADER_LEN..];

        if self.first_packet {
            self.seen.clear();
            self.first_packet = false;
            self.seen.insert(seq);
            return Ok(Some(payload));
        }

        if self.seen.contains(&seq) {
            return Ok(None);
        }
        self.seen.insert(seq);
        if self.seen.len() >= CLEAR_THRESHOLD {
            self.seen.clear();
        }
        Ok(Some(payload))
    }
}

/// Encodes the `[8-byte LE seq || payload]` wire frame.
pub fn encode_frame(seq: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; SEQ_HEADER_LEN];
    LittleEndian::write_u64(&mut out[0..8], seq);
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_first_packet() {
        let mut stream = DedupStream::new();
        let frame = encode_frame(1, b"hello");
        assert_eq!(stream.add_frame(&frame).unwrap(), Some(&b"hello"[..]));
    }

    #[test]
    fn suppresses_duplicate_sequence_numbers() {
        let mut stream = DedupStream::new();
        let frame = encode_frame(1, b"hello");
        stream.add_frame(&frame).unwrap();
        assert_eq!(stream.add_frame(&frame).unwrap(), None);
    }

    #[test]
    fn distinct_sequence_numbers_each_forward_exactly_once() {
        let mut stream = DedupStream::new();
        let mut forwarded = Vec::new();
        for seq in 0..10u64 {
            for _ in 0..3 {
                let frame = encode_frame(seq, format!("payload-{seq}").as_bytes());
                if let Some(payload) = stream.add_frame(&frame).unwrap() {
                    forwarded.push(payload.to_vec());
                }
            }
        }
        assert_eq!(forwarded.len(), 10);
    }

    #[test]
    fn set_clears_wholesale_at_threshold() {
        let mut stream = DedupStream::new();
        for seq in 0..CLEAR_THRESHOLD as u64 {
            let frame = encode_frame(seq, b"x");
            stream.add_frame(&frame).unwrap();
        }
        // the set was cleared on reaching the threshold, so sequence 0 is
        // forwarded again
        let frame = encode_frame(0, b"x");
        assert_eq!(stream.add_frame(&frame).unwrap(), Some(&b"x"[..]));
    }

    #[test]
    fn rejects_short_frame() {
        let mut stream = DedupStream::new();
        assert_eq!(stream.add_frame(&[0u8; 4]).unwrap_err(), Error::ShortHeader);
    }
}
