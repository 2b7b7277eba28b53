//! Builds the single-video-m-line offer this crate emits (RFC 8829-style
//! WebRTC offer, DTLS/ICE-only subset).

use crate::description::media::{ConnectionInfo, MediaDescription, SsrcInfo};
use crate::description::session::{Origin, SessionDescription};
use crate::direction::{Direction, Setup};
use crate::util::{Fingerprint, RtpMap};

/// Everything the offer needs that this crate doesn't own generating itself
/// (ICE credentials and candidates come from the ICE channel, the
/// fingerprint from the local DTLS certificate, the ssrc/cname from the
/// media stream).
pub struct VideoOfferParams {
    pub session_id: u64,
    pub payload_type: u8,
    pub ice_ufrag: String,
    pub ice_pwd: String,
    pub setup: Setup,
    pub fingerprint_hash_function: String,
    pub fingerprint_hex: String,
    pub candidates: Vec<String>,
    pub gathering_complete: bool,
    pub ssrc: u32,
    pub cname: String,
}

pub fn video_offer(params: VideoOfferParams) -> SessionDescription {
    let media = MediaDescription {
        media_type: "video".to_string(),
        port: 9,
        protocol: "UDP/TLS/RTP/SAVP".to_string(),
        payload_types: vec![params.payload_type],
        connection: Some(ConnectionInfo {
            net_type: "IN".to_string(),
            addr_type: "IP4".to_string(),
            address: "0.0.0.0".to_string(),
        }),
        ice_ufrag: Some(params.ice_ufrag),
        ice_pwd: Some(params.ice_pwd),
        ice_options: vec!["ice2".to_string(), "trickle".to_string()],
        fingerprint: Some(Fingerprint {
            hash_function: params.fingerprint_hash_function,
            digest: params.fingerprint_hex,
        }),
        setup: Some(params.setup),
        mid: Some("0".to_string()),
        direction: Some(Direction::SendOnly),
        rtcp_mux: true,
        rtcp: Some((
            9,
            ConnectionInfo {
                net_type: "IN".to_string(),
                addr_type: "IP4".to_string(),
                address: "0.0.0.0".to_string(),
            },
        )),
        rtpmap: vec![RtpMap {
            payload_type: params.payload_type,
            codec: "H264".to_string(),
            clock_rate: 90000,
        }],
        candidates: params.candidates,
        end_of_candidates: params.gathering_complete,
        ssrc: Some(SsrcInfo { id: params.ssrc, cname: params.cname }),
        other_attributes: Vec::new(),
    };

    SessionDescription {
        origin: Origin {
            session_id: params.session_id,
            address: "127.0.0.1".to_string(),
            ..Origin::default()
        },
        bundle_group: vec!["0".to_string()],
        media_descriptions: vec![media],
        ..SessionDescription::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> VideoOfferParams {
        VideoOfferParams {
            session_id: 42,
            payload_type: 97,
            ice_ufrag: "F7gI".to_string(),
            ice_pwd: "x9cml/YzichV2+XlhiMu8g".to_string(),
            setup: Setup::ActPass,
            fingerprint_hash_function: "sha-256".to_string(),
            fingerprint_hex: "AA:BB:CC".to_string(),
            candidates: vec!["0 1 UDP 2122260223 192.168.0.196 54400 typ host".to_string()],
            gathering_complete: true,
            ssrc: 1399694169,
            cname: "4TOk42mSjXCkVIa6".to_string(),
        }
    }

    #[test]
    fn offer_emits_the_documented_line_set_in_order() {
        let sdp = video_offer(params());
        let text = sdp.marshal();
        let expected = "\
v=0
o=- 42 2 IN IP4 127.0.0.1
s=-
t=0 0
a=group:BUNDLE 0
m=video 9 UDP/TLS/RTP/SAVP 97
c=IN IP4 0.0.0.0
a=rtcp-mux
a=rtcp:9 IN IP4 0.0.0.0
a=ice-ufrag:F7gI
a=ice-pwd:x9cml/YzichV2+XlhiMu8g
a=ice-options:ice2,trickle
a=setup:actpass
a=fingerprint:sha-256 AA:BB:CC
a=mid:0
a=sendonly
a=rtpmap:97 H264/90000
a=candidate:0 1 UDP 2122260223 192.168.0.196 54400 typ host
a=end-of-candidates
a=ssrc:1399694169 cname:4TOk42mSjXCkVIa6
";
        assert_eq!(text, expected);
    }

    #[test]
    fn offer_roundtrips_through_parse() {
        let text = video_offer(params()).marshal();
        let parsed = SessionDescription::parse(&text).unwrap();
        assert_eq!(parsed.first_video_media().unwrap().mid.as_deref(), Some("0"));
        assert_eq!(parsed.dtls_fingerprint().unwrap().digest, "AA:BB:CC");
    }
}
