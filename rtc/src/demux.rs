//! Multiplex demuxer (C7): first-byte classification of datagrams on the
//! rtcp-mux'd WebRTC socket.

/// RTCP packet types this bridge recognizes when distinguishing SRTP from
/// SRTCP on the second byte of an `Srtp` datagram.
const RTCP_PACKET_TYPES: [u8; 6] = [200, 201, 202, 203, 205, 206];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datagram {
    Stun,
    Dtls,
    Srtp,
    Srtcp,
}

/// Classifies one datagram by its leading byte(s). Returns `None` for
/// anything outside the recognized ranges; the caller logs and drops it.
pub fn classify(datagram: &[u8]) -> Option<Datagram> {
    let first = *datagram.first()?;
    match first {
        0..=3 => Some(Datagram::Stun),
        20..=63 => Some(Datagram::Dtls),
        128..=191 => {
            let second = datagram.get(1).copied().unwrap_or(0);
            if RTCP_PACKET_TYPES.contains(&second) {
                Some(Datagram::Srtcp)
            } else {
                Some(Datagram::Srtp)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_stun() {
        assert_eq!(classify(&[0x00, 0x01, 0, 0]), Some(Datagram::Stun));
    }

    #[test]
    fn classifies_dtls() {
        assert_eq!(classify(&[20, 0xfe, 0xfd]), Some(Datagram::Dtls));
    }

    #[test]
    fn classifies_srtcp_by_packet_type() {
        assert_eq!(classify(&[0x80, 200, 0, 0]), Some(Datagram::Srtcp));
        assert_eq!(classify(&[0x80, 201, 0, 0]), Some(Datagram::Srtcp));
    }

    #[test]
    fn classifies_srtp_when_not_a_known_rtcp_type() {
        assert_eq!(classify(&[0x80, 96, 0, 0]), Some(Datagram::Srtp));
    }

    #[test]
    fn rejects_out_of_range_first_byte() {
        assert_eq!(classify(&[250, 0, 0, 0]), None);
    }

    #[test]
    fn rejects_empty_datagram() {
        assert_eq!(classify(&[]), None);
    }
}
