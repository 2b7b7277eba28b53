use crate::error::{Error, Result};
use crate::header::Header;

/// A pool-borrowed RTP packet.
///
/// A `Packet` starts out idle (no buffer applied). [`Packet::apply_buffer`] parses
/// a wire datagram, borrowing ownership of the buffer for the packet's lifetime;
/// [`Packet::release_buffer`] hands the buffer back to the caller (typically to
/// return it to the pool it came from). Header fields are mutated through typed
/// setters that stage the change; nothing is written back into the wire buffer
/// until [`Packet::apply_header_changes`] is called explicitly, so a caller that
/// only reads fields never pays for a re-serialize.
pub struct Packet {
    header: Header,
    pending: Header,
    buf: Option<Vec<u8>>,
    payload_offset: usize,
    payload_len: usize,
    dirty: bool,
}

impl Default for Packet {
    fn default() -> Self {
        Packet {
            header: Header::default(),
            pending: Header::default(),
            buf: None,
            payload_offset: 0,
            payload_len: 0,
            dirty: false,
        }
    }
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.buf.is_some()
    }

    /// Parses `buf` as an RTP packet, taking ownership of it for the packet's
    /// borrowed lifetime. Any previously applied buffer is discarded without
    /// being returned to a pool — callers must `release_buffer` first if they
    /// need it back.
    pub fn apply_buffer(&mut self, buf: Vec<u8>) -> Result<()> {
        let (header, payload_offset) = Header::unmarshal(&buf)?;

        let mut payload_len = buf.len() - payload_offset;
        if header.padding && payload_len > 0 {
            let pad_count = buf[buf.len() - 1] as usize;
            if pad_count > 0 && pad_count <= payload_len {
                payload_len -= pad_count;
            }
        }

        self.pending = header.clone();
        self.header = header;
        self.payload_offset = payload_offset;
        self.payload_len = payload_len;
        self.buf = Some(buf);
        self.dirty = false;
        Ok(())
    }

    /// Returns the borrowed buffer to the caller and resets the packet to idle.
    /// Any staged, uncommitted header changes are discarded.
    pub fn release_buffer(&mut self) -> Result<Vec<u8>> {
        self.buf.take().ok_or(Error::NotReady)
    }

    fn buf(&self) -> Result<&[u8]> {
        self.buf.as_deref().ok_or(Error::NotReady)
    }

    pub fn header(&self) -> Result<&Header> {
        if self.buf.is_none() {
            return Err(Error::NotReady);
        }
        Ok(&self.header)
    }

    pub fn payload(&self) -> Result<&[u8]> {
        let buf = self.buf()?;
        Ok(&buf[self.payload_offset..self.payload_offset + self.payload_len])
    }

    pub fn marker(&self) -> Result<bool> {
        Ok(self.header()?.marker)
    }

    pub fn sequence_number(&self) -> Result<u16> {
        Ok(self.header()?.sequence_number)
    }

    pub fn timestamp(&self) -> Result<u32> {
        Ok(self.header()?.timestamp)
    }

    pub fn ssrc(&self) -> Result<u32> {
        Ok(self.header()?.ssrc)
    }

    pub fn payload_type(&self) -> Result<u8> {
        Ok(self.header()?.payload_type)
    }

    /// Stages a marker-bit change. Has no effect on the wire buffer until
    /// [`Packet::apply_header_changes`] is called.
    pub fn set_marker(&mut self, marker: bool) -> Result<()> {
        if self.buf.is_none() {
            return Err(Error::NotReady);
        }
        self.pending.marker = marker;
        self.dirty = true;
        Ok(())
    }

    pub fn set_sequence_number(&mut self, seq: u16) -> Result<()> {
        if self.buf.is_none() {
            return Err(Error::NotReady);
        }
        self.pending.sequence_number = seq;
        self.dirty = true;
        Ok(())
    }

    pub fn set_timestamp(&mut self, timestamp: u32) -> Result<()> {
        if self.buf.is_none() {
            return Err(Error::NotReady);
        }
        self.pending.timestamp = timestamp;
        self.dirty = true;
        Ok(())
    }

    pub fn set_ssrc(&mut self, ssrc: u32) -> Result<()> {
        if self.buf.is_none() {
            return Err(Error::NotReady);
        }
        self.pending.ssrc = ssrc;
        self.dirty = true;
        Ok(())
    }

    pub fn set_payload_type(&mut self, pt: u8) -> Result<()> {
        if self.buf.is_none() {
            return Err(Error::NotReady);
        }
        self.pending.payload_type = pt & 0x7F;
        self.dirty = true;
        Ok(())
    }

    /// Commits staged header changes into the wire buffer. The fixed header
    /// never changes size (CSRC count and extension are immutable post-parse),
    /// so this writes in place without reallocating.
    pub fn apply_header_changes(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let buf = self.buf.as_mut().ok_or(Error::NotReady)?;
        self.pending.marshal_to(&mut buf[..self.payload_offset])?;
        self.header = self.pending.clone();
        self.dirty = false;
        Ok(())
    }

    /// Serializes the current (committed) header plus payload into `dst`.
    pub fn write_to(&self, dst: &mut [u8]) -> Result<usize> {
        let header = self.header()?;
        let payload = self.payload()?;
        let need = header.marshal_size() + payload.len();
        if dst.len() < need {
            return Err(Error::DstTooSmall {
                need,
                have: dst.len(),
            });
        }
        let n = header.marshal_to(dst)?;
        dst[n..n + payload.len()].copy_from_slice(payload);
        Ok(n + payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::RTP_VERSION;

    fn wire_packet(seq: u16, ssrc: u32, payload: &[u8]) -> Vec<u8> {
        let header = Header {
            version: RTP_VERSION,
            marker: false,
            payload_type: 96,
            sequence_number: seq,
            timestamp: 1000,
            ssrc,
            ..Header::default()
        };
        let mut buf = vec![0u8; header.marshal_size() + payload.len()];
        let n = header.marshal_to(&mut buf).unwrap();
        buf[n..].copy_from_slice(payload);
        buf
    }

    #[test]
    fn not_ready_before_apply_buffer() {
        let p = Packet::new();
        assert_eq!(p.header().unwrap_err(), Error::NotReady);
        assert_eq!(p.payload().unwrap_err(), Error::NotReady);
    }

    #[test]
    fn apply_and_read_back() {
        let mut p = Packet::new();
        p.apply_buffer(wire_packet(42, 0xDEADBEEF, b"hello")).unwrap();
        assert_eq!(p.sequence_number().unwrap(), 42);
        assert_eq!(p.ssrc().unwrap(), 0xDEADBEEF);
        assert_eq!(p.payload().unwrap(), b"hello");
    }

    #[test]
    fn setters_defer_until_apply_header_changes() {
        let mut p = Packet::new();
        p.apply_buffer(wire_packet(1, 1, b"x")).unwrap();
        p.set_sequence_number(0xFFFE).unwrap();
        // not yet committed
        assert_eq!(p.sequence_number().unwrap(), 1);
        p.apply_header_changes().unwrap();
        assert_eq!(p.sequence_number().unwrap(), 0xFFFE);
    }

    #[test]
    fn release_buffer_resets_to_idle() {
        let mut p = Packet::new();
        p.apply_buffer(wire_packet(1, 1, b"x")).unwrap();
        let buf = p.release_buffer().unwrap();
        assert!(!buf.is_empty());
        assert_eq!(p.header().unwrap_err(), Error::NotReady);
        assert_eq!(p.release_buffer().unwrap_err(), Error::NotReady);
    }

    #[test]
    fn write_to_roundtrips_mutated_header() {
        let mut p = Packet::new();
        p.apply_buffer(wire_packet(7, 7, b"payload")).unwrap();
        p.set_marker(true).unwrap();
        p.set_ssrc(0xCAFEBABE).unwrap();
        p.apply_header_changes().unwrap();

        let mut out = vec![0u8; 64];
        let n = p.write_to(&mut out).unwrap();
        let (header, offset) = Header::unmarshal(&out[..n]).unwrap();
        assert!(header.marker);
        assert_eq!(header.ssrc, 0xCAFEBABE);
        assert_eq!(&out[offset..n], b"payload");
    }

    #[test]
    fn padding_trusted_only_when_consistent() {
        // padding bit set but padding count byte implausibly large relative to
        // payload length must be ignored rather than underflowing payload_len
        let header = Header {
            version: RTP_VERSION,
            padding: true,
            ..Header::default()
        };
        let mut buf = vec![0u8; header.marshal_size() + 1];
        header.marshal_to(&mut buf).unwrap();
        *buf.last_mut().unwrap() = 255;

        let mut p = Packet::new();
        p.apply_buffer(buf).unwrap();
        assert_eq!(p.payload().unwrap().len(), 1);
    }
}
