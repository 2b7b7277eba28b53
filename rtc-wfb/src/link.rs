//! WFB link (C13): orchestrates classifier -> crypto -> (FEC or dedup) for
//! every configured user stream.

use std::collections::HashMap;
use std::time::Instant;

use log::{debug, warn};

use crate::config::{StreamKind, WfbLinkConfig};
use crate::crypto::WfbSession;
use crate::dedup::DedupStream;
use crate::error::{Error, Result};
use crate::fec::FecReassembler;
use crate::frame::{self, SESSION_KEY_MULTIPLEX_INDEX};

const PLAIN_MAC_TAG_LEN: usize = 16;

enum Downstream {
    Fec(FecReassembler),
    NoFec(DedupStream),
}

pub struct WfbLink {
    session: WfbSession,
    streams: HashMap<u8, Downstream>,
}

impl WfbLink {
    pub fn new(config: &WfbLinkConfig) -> Result<Self> {
        let session = WfbSession::new(&config.bind_phrase)?;
        let streams = config
            .streams
            .iter()
            .map(|(&multiplex_index, &kind)| {
                let downstream = match kind {
                    StreamKind::Fec => Downstream::Fec(FecReassembler::new(config.rx_queue_max_size)),
                    StreamKind::NoFec => Downstream::NoFec(DedupStream::new()),
                };
                (multiplex_index, downstream)
            })
            .collect();
        Ok(Self { session, streams })
    }

    /// Resets every downstream FEC/dedup stream, e.g. after a session-key
    /// rotation.
    fn reset_downstream(&mut self, config: &WfbLinkConfig) {
        for (&multiplex_index, downstream) in self.streams.iter_mut() {
            *downstream = match config.streams.get(&multiplex_index) {
                Some(StreamKind::Fec) => Downstream::Fec(FecReassembler::new(config.rx_queue_max_size)),
                Some(StreamKind::NoFec) | None => Downstream::NoFec(DedupStream::new()),
            };
        }
    }

    /// Feeds one raw radio frame through the pipeline. Returns the primary
    /// payloads now forwardable to the consumer, in order. A session-key
    /// announcement frame resets downstream state and always returns empty.
    pub fn handle_frame(&mut self, raw_frame: &[u8], config: &WfbLinkConfig, now: Instant) -> Result<Vec<Vec<u8>>> {
        let classified = frame::classify(raw_frame)?;

        if classified.multiplex_index == SESSION_KEY_MULTIPLEX_INDEX {
            self.session.open_session_key_announcement(classified.payload)?;
            self.reset_downstream(config);
            debug!("wfb: session key rotated, downstream state reset");
            return Ok(Vec::new());
        }

        let inner = if classified.encrypted {
            self.session.decrypt_frame(classified.nonce, classified.payload)?
        } else {
            if classified.payload.len() < PLAIN_MAC_TAG_LEN {
                warn!("wfb: plain-MAC frame shorter than its tag, dropping");
                return Err(Error::ShortFrame);
            }
            let split = classified.payload.len() - PLAIN_MAC_TAG_LEN;
            let (data, tag) = classified.payload.split_at(split);
            self.session.verify_frame_tag(classified.nonce, data, tag)?;
            data.to_vec()
        };

        let downstream = self.streams.get_mut(&classified.multiplex_index);
        match downstream {
            Some(Downstream::Fec(reassembler)) => reassembler.add_frame(&inner, now),
            Some(Downstream::NoFec(dedup)) => Ok(dedup.add_frame(&inner)?.map(|p| vec![p.to_vec()]).unwrap_or_default()),
            None => {
                warn!("wfb: frame for unconfigured multiplex index {}", classified.multiplex_index);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::encode_frame as dedup_frame;

    fn qos_data_frame(radio_port: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 24];
        frame[0] = 0x08;
        frame[1] = 0x01;
        frame[4] = 0x01;
        frame[5..9].copy_from_slice(&[1, 2, 3, 4]);
        frame[9] = radio_port;
        frame[10] = 0x01;
        frame[11..15].copy_from_slice(&[5, 6, 7, 8]);
        frame[15] = radio_port;
        frame.extend_from_slice(payload);
        frame
    }

    fn test_config() -> WfbLinkConfig {
        let mut streams = HashMap::new();
        streams.insert(3u8, StreamKind::NoFec);
        WfbLinkConfig {
            bind_phrase: "shared phrase".to_string(),
            streams,
            rx_queue_max_size: 8,
        }
    }

    #[test]
    fn session_rotation_resets_downstream_and_invalidates_old_frames() {
        let config = test_config();
        let mut tx_session = WfbSession::new(&config.bind_phrase).unwrap();
        let mut link = WfbLink::new(&config).unwrap();
        let now = Instant::now();
        // Matches the nonce `qos_data_frame`'s fixed MAC bytes produce.
        let nonce = u64::from_be_bytes([5, 6, 7, 8, 1, 2, 3, 4]);

        // A data frame sent before any session key exists can't be produced
        // by tx_session either; instead simulate the "prior session key"
        // case by rotating once, encrypting a frame, then rotating again.
        let first_announcement = tx_session.rotate_session_key().unwrap();
        link.handle_frame(&qos_data_frame(127, &first_announcement), &config, now)
            .unwrap();

        let stale_ciphertext = tx_session.encrypt_frame(nonce, &dedup_frame(1, b"before rotation")).unwrap();
        let stale_frame = qos_data_frame(0x80 | 3, &stale_ciphertext);

        let second_announcement = tx_session.rotate_session_key().unwrap();
        link.handle_frame(&qos_data_frame(127, &second_announcement), &config, now)
            .unwrap();

        // The frame encrypted under the first session key must now fail.
        assert!(link.handle_frame(&stale_frame, &config, now).is_err());

        // A frame encrypted under the current key succeeds.
        let fresh_ciphertext = tx_session.encrypt_frame(nonce, &dedup_frame(1, b"after rotation")).unwrap();
        let fresh_frame = qos_data_frame(0x80 | 3, &fresh_ciphertext);
        let forwarded = link.handle_frame(&fresh_frame, &config, now).unwrap();
        assert_eq!(forwarded, vec![b"after rotation".to_vec()]);
    }
}
