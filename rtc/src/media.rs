//! Video track + media stream send path (C14).

use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::Mutex;

use shared::pool::SRTP_MAX_PREFIX_LENGTH;
use sdp::Direction;
use srtp::SrtpContext;

use crate::error::{Error, Result};

const MAX_SEQ_CAS_RETRIES: usize = 10;

fn direction_to_u8(direction: Direction) -> u8 {
    match direction {
        Direction::SendRecv => 0,
        Direction::SendOnly => 1,
        Direction::RecvOnly => 2,
        Direction::Inactive => 3,
    }
}

fn direction_from_u8(value: u8) -> Direction {
    match value {
        0 => Direction::SendRecv,
        1 => Direction::SendOnly,
        2 => Direction::RecvOnly,
        _ => Direction::Inactive,
    }
}

/// The single concrete video stream this bridge carries. There is no
/// polymorphic "media stream" hierarchy: audio is out of scope, so one
/// concrete type tagged with its kind is all the spec needs.
pub struct VideoTrack {
    pub ssrc: u32,
    pub payload_type: u8,
    status: AtomicU8,
    next_seq: AtomicU16,
}

impl VideoTrack {
    pub fn new(ssrc: u32, payload_type: u8) -> Self {
        Self {
            ssrc,
            payload_type,
            status: AtomicU8::new(direction_to_u8(Direction::SendRecv)),
            next_seq: AtomicU16::new(0),
        }
    }

    pub fn status(&self) -> Direction {
        direction_from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn set_status(&self, status: Direction) {
        self.status.store(direction_to_u8(status), Ordering::SeqCst);
    }

    pub fn can_send(&self) -> bool {
        matches!(self.status(), Direction::SendRecv | Direction::SendOnly)
    }

    /// 16-bit wrap-safe compare-and-swap increment. Exhausting
    /// [`MAX_SEQ_CAS_RETRIES`] raises [`Error::ConcurrencyExceeded`] instead
    /// of looping forever under pathological contention.
    fn next_sequence_number(&self) -> Result<u16> {
        let mut current = self.next_seq.load(Ordering::SeqCst);
        for _ in 0..MAX_SEQ_CAS_RETRIES {
            let next = current.wrapping_add(1);
            match self.next_seq.compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(issued) => return Ok(issued),
                Err(observed) => current = observed,
            }
        }
        Err(Error::ConcurrencyExceeded)
    }
}

/// `send_video` (C14): rewrites SSRC/sequence number, protects via SRTP, and
/// returns the ciphertext ready to hand to the UDP pool's `send_to`.
///
/// `can_send` = not closed and the track is present, in a sending direction,
/// and the DTLS transport has installed SRTP contexts — callers check the
/// first two and the DTLS-installed precondition by only calling this once
/// `srtp_ctx` holds an entry for the track's SSRC.
pub fn send_video(track: &VideoTrack, inbound_rtp: &[u8], srtp_ctx: &Mutex<Option<SrtpContext>>) -> Result<Vec<u8>> {
    if !track.can_send() {
        log::debug!("media: dropping outbound video, track not in a sending state");
        return Err(Error::Closed);
    }

    let mut buf = Vec::with_capacity(inbound_rtp.len() + SRTP_MAX_PREFIX_LENGTH);
    buf.extend_from_slice(inbound_rtp);

    let mut packet = rtp::Packet::new();
    packet.apply_buffer(buf)?;

    let seq = track.next_sequence_number()?;
    packet.set_ssrc(track.ssrc)?;
    packet.set_sequence_number(seq)?;
    packet.set_payload_type(track.payload_type)?;
    packet.apply_header_changes()?;

    let mut wire = packet.release_buffer()?;
    {
        let mut guard = srtp_ctx.lock().unwrap();
        let ctx = guard.as_mut().ok_or(Error::Closed)?;
        ctx.transform_packet(&mut wire)?;
    }
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_can_send() {
        let track = VideoTrack::new(1, 96);
        assert!(track.can_send());
    }

    #[test]
    fn inactive_track_cannot_send() {
        let track = VideoTrack::new(1, 96);
        track.set_status(Direction::Inactive);
        assert!(!track.can_send());
    }

    #[test]
    fn sequence_numbers_increment_and_wrap() {
        let track = VideoTrack::new(1, 96);
        assert_eq!(track.next_sequence_number().unwrap(), 0);
        assert_eq!(track.next_sequence_number().unwrap(), 1);
        for _ in 0..(u16::MAX as usize - 1) {
            track.next_sequence_number().unwrap();
        }
        assert_eq!(track.next_sequence_number().unwrap(), 0);
    }

    #[test]
    fn send_fails_when_srtp_not_installed() {
        let track = VideoTrack::new(0xdead_beef, 96);
        let ctx: Mutex<Option<SrtpContext>> = Mutex::new(None);
        let header = rtp_header_bytes(0, 1, 0xdead_beef);
        assert!(send_video(&track, &header, &ctx).is_err());
    }

    fn rtp_header_bytes(seq: u16, payload_type: u8, ssrc: u32) -> Vec<u8> {
        let mut header = vec![0u8; 12];
        header[0] = 0x80;
        header[1] = payload_type;
        header[2..4].copy_from_slice(&seq.to_be_bytes());
        header[8..12].copy_from_slice(&ssrc.to_be_bytes());
        header
    }
}
