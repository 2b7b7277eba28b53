//! 802.11 QoS Data frame classifier (C9): pulls the WFB-specific fields out
//! of a frame the radio layer has already demodulated and stripped of FCS.

use crate::error::{Error, Result};

const QOS_DATA_HEADER_LEN: usize = 24;
const FRAME_CONTROL: [u8; 2] = [0x08, 0x01];

/// One classified WFB radio frame, borrowed from the raw buffer the caller
/// handed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFrame<'a> {
    pub air_ground_id: u8,
    pub multiplex_index: u8,
    pub encrypted: bool,
    pub nonce: u64,
    pub payload: &'a [u8],
}

/// Multiplex index reserved for session-key announcement packets (C10).
pub const SESSION_KEY_MULTIPLEX_INDEX: u8 = 127;

/// Classifies a raw radio frame (RFC 802.11 QoS Data header, 24 bytes,
/// followed by payload). `mac_src` is bytes 10..16, `mac_dst` is bytes
/// 4..10 of the header.
pub fn classify(frame: &[u8]) -> Result<ClassifiedFrame<'_>> {
    if frame.len() < QOS_DATA_HEADER_LEN {
        return Err(Error::ShortFrame);
    }
    if frame[0..2] != FRAME_CONTROL {
        return Err(Error::NotQosData);
    }
    let payload = &frame[QOS_DATA_HEADER_LEN..];
    if payload.is_empty() {
        return Err(Error::EmptyPayload);
    }

    let mac_dst = &frame[4..10];
    let mac_src = &frame[10..16];

    if mac_src[0] != mac_dst[0] {
        return Err(Error::AddressMismatch);
    }
    if mac_src[5] != mac_dst[5] {
        return Err(Error::AddressMismatch);
    }

    let air_ground_id = mac_src[0];
    let radio_port = mac_src[5];
    let encrypted = radio_port & 0x80 != 0;
    let multiplex_index = radio_port & 0x7F;

    let mut nonce_bytes = [0u8; 8];
    nonce_bytes[0..4].copy_from_slice(&mac_src[1..5]);
    nonce_bytes[4..8].copy_from_slice(&mac_dst[1..5]);
    let nonce = u64::from_be_bytes(nonce_bytes);

    Ok(ClassifiedFrame {
        air_ground_id,
        multiplex_index,
        encrypted,
        nonce,
        payload,
    })
}
