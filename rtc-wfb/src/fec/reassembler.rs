//! Bounded ordered block queue orchestrating `FecBlock` (C11).

use std::collections::VecDeque;
use std::time::Instant;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::fec::block::FecBlock;

const FEC_HEADER_LEN: usize = 8;

/// Default queue cap from the configuration section; callers may override.
pub const DEFAULT_RX_QUEUE_MAX_SIZE: usize = 64;

struct FecHeader {
    block_idx: u32,
    fragment_idx: u8,
    n_primary_fragments: u8,
    data_size: u16,
}

fn parse_header(frame: &[u8]) -> Result<(FecHeader, &[u8])> {
    if frame.len() < FEC_HEADER_LEN {
        return Err(Error::ShortHeader);
    }
    let block_idx = LittleEndian::read_u32(&frame[0..4]);
    let fragment_idx = frame[4];
    let n_primary_fragments = frame[5];
    let data_size = LittleEndian::read_u16(&frame[6..8]);
    let body = &frame[FEC_HEADER_LEN..];
    if body.len() != data_size as usize {
        return Err(Error::FecHeaderMismatch);
    }
    Ok((
        FecHeader {
            block_idx: block_idx,
            fragment_idx,
            n_primary_fragments,
            data_size,
        },
        body,
    ))
}

/// Encodes the 8-byte FEC fragment header the wire format uses.
pub fn encode_header(block_idx: u32, fragment_idx: u8, n_primary_fragments: u8, data_size: u16) -> [u8; FEC_HEADER_LEN] {
    let mut out = [0u8; FEC_HEADER_LEN];
    LittleEndian::write_u32(&mut out[0..4], block_idx);
    out[4] = fragment_idx;
    out[5] = n_primary_fragments;
    LittleEndian::write_u16(&mut out[6..8], data_size);
    out
}

pub struct FecReassembler {
    queue_cap: usize,
    blocks: VecDeque<FecBlock>,
    last_known_block_idx: Option<u64>,
    /// Highest block_idx that has left the queue (forwarded or evicted).
    /// Forwarding is strictly monotonic, so any frame at or below this is
    /// for a block we will never revisit.
    retired_through: Option<u64>,
}

impl FecReassembler {
    pub fn new(queue_cap: usize) -> Self {
        Self {
            queue_cap,
            blocks: VecDeque::new(),
            last_known_block_idx: None,
            retired_through: None,
        }
    }

    fn mark_retired(&mut self, block_idx: u64) {
        self.retired_through = Some(match self.retired_through {
            Some(prior) => prior.max(block_idx),
            None => block_idx,
        });
    }

    fn block_position(&self, block_idx: u64) -> Option<usize> {
        self.blocks.iter().position(|b| b.block_idx == block_idx)
    }

    /// Forces eviction of the oldest block, forwarding whatever primaries
    /// are currently available and discarding the rest as lost.
    fn evict_oldest(&mut self) -> Vec<Vec<u8>> {
        match self.blocks.pop_front() {
            Some(mut block) => {
                self.mark_retired(block.block_idx);
                block.drain_forwardable()
            }
            None => Vec::new(),
        }
    }

    /// Removes every block at the front of the queue that has forwarded
    /// all of its primaries.
    fn drain_completed_front(&mut self) {
        while let Some(front) = self.blocks.front() {
            if front.all_primaries_forwarded() {
                let block_idx = front.block_idx;
                self.blocks.pop_front();
                self.mark_retired(block_idx);
            } else {
                break;
            }
        }
    }

    /// Feeds one FEC-tagged frame. Returns the primary payloads now
    /// forwardable, in order. Frames for a block that has already left the
    /// queue are ignored, matching the "forwarded at most once" invariant.
    pub fn add_frame(&mut self, frame: &[u8], now: Instant) -> Result<Vec<Vec<u8>>> {
        let (header, body) = parse_header(frame)?;
        let block_idx = header.block_idx as u64;

        if let Some(retired) = self.retired_through {
            if block_idx <= retired {
                return Ok(Vec::new());
            }
        }

        self.last_known_block_idx = Some(match self.last_known_block_idx {
            Some(known) => known.max(block_idx),
            None => block_idx,
        });

        let mut forwarded = Vec::new();

        let position = match self.block_position(block_idx) {
            Some(pos) => pos,
            None => {
                if self.blocks.len() >= self.queue_cap {
                    forwarded.extend(self.evict_oldest());
                }
                self.blocks.push_back(FecBlock::new(block_idx, now));
                // Keep the queue ordered by block_idx so forwarding stays
                // strictly monotonic regardless of arrival order.
                let mut entries: Vec<FecBlock> = self.blocks.drain(..).collect();
                entries.sort_by_key(|b| b.block_idx);
                self.blocks = entries.into();
                self.block_position(block_idx).expect("just inserted")
            }
        };

        let block = &mut self.blocks[position];
        block.add_fragment(header.fragment_idx, header.n_primary_fragments, header.data_size, body)?;
        block.try_reconstruct();

        if position == 0 {
            forwarded.extend(block.drain_forwardable());
        }

        self.drain_completed_front();
        self.evict_stale();

        Ok(forwarded)
    }

    /// Drops blocks that have fallen further behind `last_known_block_idx`
    /// than the queue cap allows, per the eviction policy.
    fn evict_stale(&mut self) {
        let Some(last_known) = self.last_known_block_idx else {
            return;
        };
        while let Some(front) = self.blocks.front() {
            if last_known.saturating_sub(front.block_idx) >= self.queue_cap as u64 {
                let block_idx = front.block_idx;
                self.blocks.pop_front();
                self.mark_retired(block_idx);
            } else {
                break;
            }
        }
    }

    pub fn in_flight_blocks(&self) -> usize {
        self.blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(block_idx: u32, fragment_idx: u8, n_primary: u8, body: &[u8]) -> Vec<u8> {
        let header = encode_header(block_idx, fragment_idx, n_primary, body.len() as u16);
        let mut out = header.to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn scenario_5_fixed_vector() {
        use crate::fec::gf256;

        let mut reassembler = FecReassembler::new(DEFAULT_RX_QUEUE_MAX_SIZE);
        let now = Instant::now();
        let primary = |n: u8| vec![n; 100];

        // primary 0 is immediately forwardable on arrival
        let forwarded = reassembler.add_frame(&frame(7, 0, 3, &primary(0)), now).unwrap();
        assert_eq!(forwarded, vec![primary(0)]);

        // primary 2 arrives but primary 1 is still missing, blocking it
        let forwarded = reassembler.add_frame(&frame(7, 2, 3, &primary(2)), now).unwrap();
        assert!(forwarded.is_empty());

        let mut secondary_body = vec![0u8; 100];
        for (primary_index, body) in [primary(0), primary(1), primary(2)].iter().enumerate() {
            let coeff = gf256::inv((1 ^ primary_index ^ 128) as u8);
            for (b, p) in secondary_body.iter_mut().zip(body.iter()) {
                *b ^= gf256::mul(coeff, *p);
            }
        }
        // the secondary reconstructs primary 1, unblocking primary 2 too
        let forwarded = reassembler.add_frame(&frame(7, 4, 3, &secondary_body), now).unwrap();
        assert_eq!(forwarded, vec![primary(1), primary(2)]);

        // duplicate fragment idx=1 (now reconstructed) is ignored
        let forwarded = reassembler.add_frame(&frame(7, 1, 3, &primary(1)), now).unwrap();
        assert!(forwarded.is_empty());

        let forwarded = reassembler.add_frame(&frame(8, 0, 3, &primary(9)), now).unwrap();
        assert_eq!(forwarded, vec![primary(9)]);
    }

    #[test]
    fn queue_never_exceeds_cap() {
        let mut reassembler = FecReassembler::new(4);
        let now = Instant::now();
        for block_idx in 0..20u32 {
            reassembler.add_frame(&frame(block_idx, 0, 2, b"ab"), now).unwrap();
            assert!(reassembler.in_flight_blocks() <= 4);
        }
    }

    #[test]
    fn rejects_short_header() {
        let mut reassembler = FecReassembler::new(4);
        assert_eq!(
            reassembler.add_frame(&[0u8; 4], Instant::now()).unwrap_err(),
            Error::ShortHeader
        );
    }
}
