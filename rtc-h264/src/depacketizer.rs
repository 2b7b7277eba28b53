use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::nal::{NalUnitType, ANNEX_B_START_CODE};

/// Sequence-number comparison with RFC 1982-style wrap-around tie-break: a
/// distance past `0xFFFF - 2000` is assumed to be a wrapped pair and compared
/// in reverse rather than numerically.
fn seq_cmp(a: u16, b: u16) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let dist = a.max(b) - a.min(b);
    if dist as u32 > 0xFFFFu32 - 2000 {
        b.cmp(&a)
    } else {
        a.cmp(&b)
    }
}

/// A complete, reassembled access unit: its constituent NAL units, the Annex-B
/// byte stream ready for a decoder, and whether it carries SPS/PPS without a
/// non-IDR slice (i.e. is safe to start decoding from).
#[derive(Debug, Clone)]
pub struct Frame {
    pub nal_units: Vec<Vec<u8>>,
    pub annex_b: Vec<u8>,
    pub key_frame: bool,
}

/// Per-frame H.264 RTP depacketizer (RFC 6184).
///
/// Fragments are buffered by arrival order, keyed to the current RTP
/// timestamp; a timestamp change before a marker bit discards whatever was
/// buffered for the previous (incomplete) frame. On the marker bit, fragments
/// are sorted by sequence number and reduced to NAL units.
pub struct Depacketizer {
    current_timestamp: Option<u32>,
    fragments: Vec<(u16, Vec<u8>)>,
    dropped_unsupported: u64,
}

impl Default for Depacketizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Depacketizer {
    pub fn new() -> Self {
        Depacketizer {
            current_timestamp: None,
            fragments: Vec::new(),
            dropped_unsupported: 0,
        }
    }

    /// Count of NAL units dropped because they used an aggregation/fragmentation
    /// mode this depacketizer does not implement (STAP-B, MTAP16, MTAP24, FU-B).
    pub fn dropped_unsupported(&self) -> u64 {
        self.dropped_unsupported
    }

    /// Feeds one RTP packet's payload into the accumulator. Returns a completed
    /// [`Frame`] once `marker` is set, or `None` while still accumulating.
    pub fn push(
        &mut self,
        payload: &[u8],
        seq_num: u16,
        timestamp: u32,
        marker: bool,
    ) -> Result<Option<Frame>> {
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }
        if NalUnitType::from(payload[0]) == NalUnitType::FuA && payload.len() < 2 {
            return Err(Error::ShortFuHeader);
        }

        if let Some(current) = self.current_timestamp {
            if current != timestamp {
                self.fragments.clear();
            }
        }
        self.current_timestamp = Some(timestamp);
        self.fragments.push((seq_num, payload.to_vec()));

        if !marker {
            return Ok(None);
        }

        let mut frags = std::mem::take(&mut self.fragments);
        self.current_timestamp = None;
        frags.sort_by(|a, b| seq_cmp(a.0, b.0));

        let nal_units = self.reassemble(frags);
        Ok(Some(self.finish(nal_units)))
    }

    fn reassemble(&mut self, frags: Vec<(u16, Vec<u8>)>) -> Vec<Vec<u8>> {
        let mut nal_units = Vec::new();
        let mut fu_acc: Option<(u8, Vec<u8>)> = None;

        for (_, payload) in frags {
            if payload.is_empty() {
                continue;
            }
            let nal_type = NalUnitType::from(payload[0]);
            match nal_type {
                NalUnitType::FuA => {
                    if payload.len() < 2 {
                        continue;
                    }
                    let fu_indicator = payload[0];
                    let fu_header = payload[1];
                    let start = fu_header & 0x80 != 0;
                    let end = fu_header & 0x40 != 0;
                    let original_type = fu_header & 0x1F;
                    let nal_header = (fu_indicator & 0xE0) | original_type;
                    let fragment = &payload[2..];

                    if start {
                        fu_acc = Some((nal_header, fragment.to_vec()));
                    } else if let Some((header, buf)) = fu_acc.as_mut() {
                        buf.extend_from_slice(fragment);
                        if end {
                            let mut nal = Vec::with_capacity(1 + buf.len());
                            nal.push(*header);
                            nal.append(buf);
                            nal_units.push(nal);
                            fu_acc = None;
                        }
                    }
                    // a Mid/End fragment with no prior Start means we joined the
                    // stream mid-NAL; drop it silently.
                }
                NalUnitType::StapA => {
                    let mut offset = 1;
                    while offset + 2 <= payload.len() {
                        let size = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
                        offset += 2;
                        if offset + size > payload.len() {
                            break;
                        }
                        nal_units.push(payload[offset..offset + size].to_vec());
                        offset += size;
                    }
                }
                t if t.is_unsupported_aggregation() => {
                    self.dropped_unsupported += 1;
                    log::debug!("h264: dropping unsupported NAL aggregation/fragmentation mode");
                }
                _ => {
                    nal_units.push(payload);
                }
            }
        }

        nal_units
    }

    fn finish(&self, nal_units: Vec<Vec<u8>>) -> Frame {
        let mut annex_b = Vec::new();
        let mut has_parameter_set = false;
        let mut has_non_idr_slice = false;

        for nal in &nal_units {
            annex_b.extend_from_slice(&ANNEX_B_START_CODE);
            annex_b.extend_from_slice(nal);

            match NalUnitType::from(nal[0]) {
                NalUnitType::Sps | NalUnitType::Pps => has_parameter_set = true,
                NalUnitType::CodedSliceNonIdr => has_non_idr_slice = true,
                _ => {}
            }
        }

        Frame {
            nal_units,
            annex_b,
            key_frame: has_parameter_set && !has_non_idr_slice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_whole_nal_unit() {
        let mut d = Depacketizer::new();
        let payload = [0x65u8, 0x01, 0x02, 0x03];
        let frame = d.push(&payload, 1, 1000, true).unwrap().unwrap();
        assert_eq!(frame.nal_units, vec![payload.to_vec()]);
        assert_eq!(&frame.annex_b[..4], &ANNEX_B_START_CODE);
    }

    #[test]
    fn scenario_1_fu_a_reassembly() {
        let mut d = Depacketizer::new();
        let fu_indicator = 0x7Cu8;
        let start = [fu_indicator, 0x85, b'a' as u8, b'a' as u8];
        let mid = [fu_indicator, 0x05, b'b' as u8, b'b' as u8];
        let end = [fu_indicator, 0x45, b'c' as u8, b'c' as u8];

        assert!(d.push(&start, 100, 7, false).unwrap().is_none());
        assert!(d.push(&mid, 101, 7, false).unwrap().is_none());
        let frame = d.push(&end, 102, 7, true).unwrap().unwrap();

        assert_eq!(frame.nal_units.len(), 1);
        assert_eq!(frame.nal_units[0][0], 0x65);
        assert_eq!(&frame.nal_units[0][1..], b"aabbcc");
        assert!(!frame.key_frame);
    }

    #[test]
    fn scenario_2_stap_a_sps_pps_is_key_frame() {
        let mut d = Depacketizer::new();
        let sps = vec![0x67u8, 1, 2, 3, 4, 5, 6];
        let pps = vec![0x68u8, 1, 2, 3];

        let mut payload = vec![24u8];
        payload.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        payload.extend_from_slice(&sps);
        payload.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        payload.extend_from_slice(&pps);

        let frame = d.push(&payload, 1, 5000, true).unwrap().unwrap();
        assert_eq!(frame.nal_units, vec![sps, pps]);
        assert!(frame.key_frame);
    }

    #[test]
    fn timestamp_change_before_marker_discards_accumulator() {
        let mut d = Depacketizer::new();
        let fu_indicator = 0x7Cu8;
        let start = [fu_indicator, 0x85, 1, 2];
        assert!(d.push(&start, 1, 10, false).unwrap().is_none());

        // a new frame begins before the prior one's marker arrived
        let whole = [0x67u8, 9, 9];
        let frame = d.push(&whole, 2, 20, true).unwrap().unwrap();
        assert_eq!(frame.nal_units, vec![whole.to_vec()]);
    }

    #[test]
    fn stap_a_malformed_tail_is_dropped_silently() {
        let mut d = Depacketizer::new();
        let mut payload = vec![24u8];
        payload.extend_from_slice(&3u16.to_be_bytes());
        payload.extend_from_slice(&[1, 2, 3]);
        // trailing declared size exceeds remaining bytes
        payload.extend_from_slice(&100u16.to_be_bytes());
        payload.push(0xAA);

        let frame = d.push(&payload, 1, 1, true).unwrap().unwrap();
        assert_eq!(frame.nal_units, vec![vec![1u8, 2, 3]]);
    }

    #[test]
    fn unsupported_aggregation_mode_is_counted_and_dropped() {
        let mut d = Depacketizer::new();
        let payload = [25u8, 0, 0]; // STAP-B
        let frame = d.push(&payload, 1, 1, true).unwrap().unwrap();
        assert!(frame.nal_units.is_empty());
        assert_eq!(d.dropped_unsupported(), 1);
    }

    #[test]
    fn sequence_wraparound_tie_break_orders_correctly() {
        assert_eq!(seq_cmp(65530, 5), Ordering::Less);
        assert_eq!(seq_cmp(5, 65530), Ordering::Greater);
        assert_eq!(seq_cmp(10, 20), Ordering::Less);
        assert_eq!(seq_cmp(20, 10), Ordering::Greater);
    }

    #[test]
    fn empty_payload_is_rejected() {
        let mut d = Depacketizer::new();
        assert_eq!(d.push(&[], 1, 1, true).unwrap_err(), Error::EmptyPayload);
    }
}
