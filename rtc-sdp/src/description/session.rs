use std::fmt;
use std::str::FromStr;

use crate::description::media::{ConnectionInfo, MediaDescription};
use crate::direction::Setup;
use crate::error::{Error, Result};
use crate::lexer::{self, split_attribute};
use crate::util::Fingerprint;

/// `o=<username> <sess-id> <sess-version> <nettype> <addrtype> <unicast-address>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: u64,
    pub session_version: u64,
    pub net_type: String,
    pub addr_type: String,
    pub address: String,
}

impl Default for Origin {
    fn default() -> Self {
        Origin {
            username: "-".to_string(),
            session_id: 0,
            session_version: 2,
            net_type: "IN".to_string(),
            addr_type: "IP4".to_string(),
            address: "127.0.0.1".to_string(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.username, self.session_id, self.session_version, self.net_type, self.addr_type, self.address
        )
    }
}

impl FromStr for Origin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let username = parts.next();
        let session_id = parts.next().and_then(|s| s.parse::<u64>().ok());
        let session_version = parts.next().and_then(|s| s.parse::<u64>().ok());
        let net_type = parts.next();
        let addr_type = parts.next();
        let address = parts.next();
        match (username, session_id, session_version, net_type, addr_type, address) {
            (Some(username), Some(session_id), Some(session_version), Some(net_type), Some(addr_type), Some(address)) => {
                Ok(Origin {
                    username: username.to_string(),
                    session_id,
                    session_version,
                    net_type: net_type.to_string(),
                    addr_type: addr_type.to_string(),
                    address: address.to_string(),
                })
            }
            _ => Err(Error::MalformedLine(format!("o={s}"))),
        }
    }
}

/// Offer/answer type passed to `set_remote_description`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// A whole SDP document: session-level header plus zero or more `m=`
/// sections. Only the subset of RFC 4566 this crate speaks is interpreted —
/// everything else round-trips through `other_attributes` on whichever
/// level it appeared at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub origin: Origin,
    pub session_name: String,
    pub time: (u64, u64),
    pub bundle_group: Vec<String>,
    pub connection: Option<ConnectionInfo>,
    pub ice_ufrag: Option<String>,
    pub ice_pwd: Option<String>,
    pub fingerprint: Option<Fingerprint>,
    pub setup: Option<Setup>,
    pub media_descriptions: Vec<MediaDescription>,
    pub other_attributes: Vec<(String, Option<String>)>,
}

impl Default for SessionDescription {
    fn default() -> Self {
        SessionDescription {
            origin: Origin::default(),
            session_name: "-".to_string(),
            time: (0, 0),
            bundle_group: Vec::new(),
            connection: None,
            ice_ufrag: None,
            ice_pwd: None,
            fingerprint: None,
            setup: None,
            media_descriptions: Vec::new(),
            other_attributes: Vec::new(),
        }
    }
}

impl SessionDescription {
    /// Decodes a full SDP document (RFC 4566 §5). Unrecognized attribute
    /// lines are kept verbatim on whichever session/media level they
    /// appeared on, never interpreted.
    pub fn parse(text: &str) -> Result<Self> {
        let mut session = SessionDescription::default();
        let mut current_media: Option<usize> = None;

        for line in lexer::lines(text) {
            let line = line?;
            match line.key {
                'v' => {}
                'o' => session.origin = line.value.parse()?,
                's' => session.session_name = line.value.to_string(),
                't' => {
                    let mut parts = line.value.split_whitespace();
                    let start = parts.next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
                    let stop = parts.next().and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
                    session.time = (start, stop);
                }
                'c' => {
                    let info = line.value.parse()?;
                    match current_media.and_then(|i| session.media_descriptions.get_mut(i)) {
                        Some(media) => media.connection = Some(info),
                        None => session.connection = Some(info),
                    }
                }
                'm' => {
                    session.media_descriptions.push(MediaDescription::parse_mline(line.value)?);
                    current_media = Some(session.media_descriptions.len() - 1);
                }
                'a' => session.apply_attribute(line.value, current_media)?,
                _ => {}
            }
        }

        Ok(session)
    }

    fn apply_attribute(&mut self, value: &str, current_media: Option<usize>) -> Result<()> {
        if let Some(media) = current_media.and_then(|i| self.media_descriptions.get_mut(i)) {
            return media.apply_attribute(value);
        }

        let (name, rest) = split_attribute(value);
        match (name, rest) {
            ("group", Some(v)) => {
                let mut parts = v.split_whitespace();
                if parts.next() == Some("BUNDLE") {
                    self.bundle_group = parts.map(str::to_string).collect();
                } else {
                    self.other_attributes.push((name.to_string(), Some(v.to_string())));
                }
            }
            ("ice-ufrag", Some(v)) => self.ice_ufrag = Some(v.to_string()),
            ("ice-pwd", Some(v)) => self.ice_pwd = Some(v.to_string()),
            ("fingerprint", Some(v)) => self.fingerprint = Some(v.parse()?),
            ("setup", Some(v)) => self.setup = Some(v.parse()?),
            _ => self.other_attributes.push((name.to_string(), rest.map(str::to_string))),
        }
        Ok(())
    }

    /// Encodes this document back to SDP text, one `field=value\n` line at a
    /// time in the session-then-media order RFC 4566 requires.
    pub fn marshal(&self) -> String {
        let mut out = String::new();
        out.push_str("v=0\n");
        out.push_str(&format!("o={}\n", self.origin));
        out.push_str(&format!("s={}\n", self.session_name));
        out.push_str(&format!("t={} {}\n", self.time.0, self.time.1));
        if !self.bundle_group.is_empty() {
            out.push_str(&format!("a=group:BUNDLE {}\n", self.bundle_group.join(" ")));
        }
        if let Some(v) = &self.ice_ufrag {
            out.push_str(&format!("a=ice-ufrag:{v}\n"));
        }
        if let Some(v) = &self.ice_pwd {
            out.push_str(&format!("a=ice-pwd:{v}\n"));
        }
        if let Some(v) = &self.fingerprint {
            out.push_str(&format!("a=fingerprint:{v}\n"));
        }
        if let Some(v) = &self.setup {
            out.push_str(&format!("a=setup:{v}\n"));
        }
        for (name, value) in &self.other_attributes {
            match value {
                Some(v) => out.push_str(&format!("a={name}:{v}\n")),
                None => out.push_str(&format!("a={name}\n")),
            }
        }
        for media in &self.media_descriptions {
            media.write(&mut out);
        }
        out
    }

    /// The first `m=video` section, if any.
    pub fn first_video_media(&self) -> Option<&MediaDescription> {
        self.media_descriptions.iter().find(|m| m.media_type == "video")
    }

    /// ICE credentials from the first video m-line, falling back to the
    /// session level (RFC 8839 allows either).
    pub fn ice_credentials(&self) -> Option<(&str, &str)> {
        let media = self.first_video_media();
        let ufrag = media.and_then(|m| m.ice_ufrag.as_deref()).or(self.ice_ufrag.as_deref());
        let pwd = media.and_then(|m| m.ice_pwd.as_deref()).or(self.ice_pwd.as_deref());
        ufrag.zip(pwd)
    }

    /// DTLS fingerprint from the first video m-line, falling back to the
    /// session level (RFC 8842 allows either).
    pub fn dtls_fingerprint(&self) -> Option<&Fingerprint> {
        self.first_video_media()
            .and_then(|m| m.fingerprint.as_ref())
            .or(self.fingerprint.as_ref())
    }

    /// DTLS setup role from the first video m-line, falling back to the
    /// session level.
    pub fn dtls_setup(&self) -> Option<Setup> {
        self.first_video_media().and_then(|m| m.setup).or(self.setup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;

    const OFFER: &str = "\
v=0
o=- 20518 2 IN IP4 203.0.113.1
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
a=fingerprint:sha-256 49:66:12:17:0D:1C:91:AE:57:4C:C6:36:DD:D5:97:D2
a=mid:0
a=sendonly
a=rtpmap:97 H264/90000
a=candidate:0 1 UDP 2122260223 192.168.0.196 54400 typ host
a=end-of-candidates
a=ssrc:1399694169 cname:4TOk42mSjXCkVIa6
a=extmap:1 urn:ietf:params:rtp-hdrext:toffset
";

    #[test]
    fn parses_full_offer() {
        let sdp = SessionDescription::parse(OFFER).unwrap();
        assert_eq!(sdp.origin.session_id, 20518);
        assert_eq!(sdp.bundle_group, vec!["0".to_string()]);
        assert_eq!(sdp.media_descriptions.len(), 1);

        let media = &sdp.media_descriptions[0];
        assert_eq!(media.media_type, "video");
        assert_eq!(media.port, 9);
        assert_eq!(media.protocol, "UDP/TLS/RTP/SAVP");
        assert_eq!(media.payload_types, vec![97]);
        assert!(media.rtcp_mux);
        assert_eq!(media.ice_ufrag.as_deref(), Some("F7gI"));
        assert_eq!(media.setup, Some(Setup::ActPass));
        assert_eq!(media.direction, Some(Direction::SendOnly));
        assert_eq!(media.rtpmap[0].codec, "H264");
        assert_eq!(media.candidates.len(), 1);
        assert!(media.end_of_candidates);
        assert_eq!(media.ssrc.as_ref().unwrap().id, 1399694169);
        assert_eq!(
            media.other_attributes,
            vec![("extmap".to_string(), Some("1 urn:ietf:params:rtp-hdrext:toffset".to_string()))]
        );
    }

    #[test]
    fn ice_credentials_and_fingerprint_resolve_from_media_level() {
        let sdp = SessionDescription::parse(OFFER).unwrap();
        assert_eq!(sdp.ice_credentials(), Some(("F7gI", "x9cml/YzichV2+XlhiMu8g")));
        assert!(sdp.dtls_fingerprint().is_some());
        assert_eq!(sdp.dtls_setup(), Some(Setup::ActPass));
    }

    #[test]
    fn missing_fingerprint_is_none() {
        let text = "v=0\no=- 1 2 IN IP4 0.0.0.0\ns=-\nt=0 0\nm=video 9 UDP/TLS/RTP/SAVP 97\n";
        let sdp = SessionDescription::parse(text).unwrap();
        assert!(sdp.dtls_fingerprint().is_none());
    }

    #[test]
    fn no_video_media_means_no_credentials() {
        let text = "v=0\no=- 1 2 IN IP4 0.0.0.0\ns=-\nt=0 0\n";
        let sdp = SessionDescription::parse(text).unwrap();
        assert!(sdp.first_video_media().is_none());
        assert!(sdp.ice_credentials().is_none());
    }

    #[test]
    fn marshal_emits_bundle_group_and_media_lines() {
        let sdp = SessionDescription::parse(OFFER).unwrap();
        let out = sdp.marshal();
        assert!(out.starts_with("v=0\n"));
        assert!(out.contains("a=group:BUNDLE 0\n"));
        assert!(out.contains("m=video 9 UDP/TLS/RTP/SAVP 97\n"));
        assert!(out.contains("a=rtcp-mux\n"));
        assert!(out.contains("a=end-of-candidates\n"));
    }
}
