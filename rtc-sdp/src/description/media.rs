use std::fmt;
use std::str::FromStr;

use crate::direction::{Direction, Setup};
use crate::error::{Error, Result};
use crate::lexer::split_attribute;
use crate::util::{Fingerprint, RtpMap};

/// `c=<net type> <addr type> <address>` (RFC 4566 §5.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub net_type: String,
    pub addr_type: String,
    pub address: String,
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.net_type, self.addr_type, self.address)
    }
}

impl FromStr for ConnectionInfo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (net_type, addr_type, address) = (parts.next(), parts.next(), parts.next());
        match (net_type, addr_type, address) {
            (Some(net_type), Some(addr_type), Some(address)) => Ok(ConnectionInfo {
                net_type: net_type.to_string(),
                addr_type: addr_type.to_string(),
                address: address.to_string(),
            }),
            _ => Err(Error::MalformedLine(format!("c={s}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsrcInfo {
    pub id: u32,
    pub cname: String,
}

/// One `m=` section: media type, transport, payload types, and the
/// attributes this crate understands (ICE credentials, DTLS fingerprint and
/// setup role, mid, direction, rtcp-mux, candidates, rtpmap, ssrc). Anything
/// else is retained verbatim in `other_attributes` but never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaDescription {
    pub media_type: String,
    pub port: u16,
    pub protocol: String,
    pub payload_types: Vec<u8>,
    pub connection: Option<ConnectionInfo>,
    pub ice_ufrag: Option<String>,
    pub ice_pwd: Option<String>,
    pub ice_options: Vec<String>,
    pub fingerprint: Option<Fingerprint>,
    pub setup: Option<Setup>,
    pub mid: Option<String>,
    pub direction: Option<Direction>,
    pub rtcp_mux: bool,
    pub rtcp: Option<(u16, ConnectionInfo)>,
    pub rtpmap: Vec<RtpMap>,
    pub candidates: Vec<String>,
    pub end_of_candidates: bool,
    pub ssrc: Option<SsrcInfo>,
    pub other_attributes: Vec<(String, Option<String>)>,
}

impl MediaDescription {
    pub(crate) fn parse_mline(value: &str) -> Result<Self> {
        let mut parts = value.split_whitespace();
        let media_type = parts.next().ok_or_else(|| Error::MalformedLine(format!("m={value}")))?;
        let port = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| Error::MalformedLine(format!("m={value}")))?;
        let protocol = parts.next().ok_or_else(|| Error::MalformedLine(format!("m={value}")))?;
        let payload_types = parts
            .map(|s| s.parse::<u8>().map_err(|_| Error::InvalidInteger(s.to_string())))
            .collect::<Result<Vec<u8>>>()?;
        Ok(MediaDescription {
            media_type: media_type.to_string(),
            port,
            protocol: protocol.to_string(),
            payload_types,
            ..Default::default()
        })
    }

    pub(crate) fn apply_connection(&mut self, value: &str) -> Result<()> {
        self.connection = Some(value.parse()?);
        Ok(())
    }

    pub(crate) fn apply_attribute(&mut self, value: &str) -> Result<()> {
        let (name, rest) = split_attribute(value);
        match (name, rest) {
            ("ice-ufrag", Some(v)) => self.ice_ufrag = Some(v.to_string()),
            ("ice-pwd", Some(v)) => self.ice_pwd = Some(v.to_string()),
            ("ice-options", Some(v)) => {
                self.ice_options = v.split(',').map(str::to_string).collect();
            }
            ("fingerprint", Some(v)) => self.fingerprint = Some(v.parse()?),
            ("setup", Some(v)) => self.setup = Some(v.parse()?),
            ("mid", Some(v)) => self.mid = Some(v.to_string()),
            ("rtcp-mux", None) => self.rtcp_mux = true,
            ("rtcp", Some(v)) => {
                let mut parts = v.splitn(2, ' ');
                let port = parts
                    .next()
                    .and_then(|s| s.parse::<u16>().ok())
                    .ok_or_else(|| Error::InvalidAttributeValue { attr: "rtcp", value: v.to_string() })?;
                let info = parts
                    .next()
                    .ok_or_else(|| Error::InvalidAttributeValue { attr: "rtcp", value: v.to_string() })?
                    .parse()?;
                self.rtcp = Some((port, info));
            }
            ("rtpmap", Some(v)) => self.rtpmap.push(v.parse()?),
            ("candidate", Some(v)) => self.candidates.push(v.to_string()),
            ("end-of-candidates", None) => self.end_of_candidates = true,
            ("ssrc", Some(v)) => {
                let mut parts = v.splitn(2, ' ');
                let id = parts
                    .next()
                    .and_then(|s| s.parse::<u32>().ok())
                    .ok_or_else(|| Error::InvalidAttributeValue { attr: "ssrc", value: v.to_string() })?;
                let cname = parts
                    .next()
                    .and_then(|s| s.strip_prefix("cname:"))
                    .unwrap_or("")
                    .to_string();
                self.ssrc = Some(SsrcInfo { id, cname });
            }
            ("sendrecv" | "sendonly" | "recvonly" | "inactive", None) => {
                self.direction = Some(name.parse()?);
            }
            _ => self.other_attributes.push((name.to_string(), rest.map(str::to_string))),
        }
        Ok(())
    }

    pub(crate) fn write(&self, out: &mut String) {
        let payloads = self
            .payload_types
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!("m={} {} {} {payloads}\n", self.media_type, self.port, self.protocol));
        if let Some(c) = &self.connection {
            out.push_str(&format!("c={c}\n"));
        }
        if self.rtcp_mux {
            out.push_str("a=rtcp-mux\n");
        }
        if let Some((port, info)) = &self.rtcp {
            out.push_str(&format!("a=rtcp:{port} {info}\n"));
        }
        if let Some(v) = &self.ice_ufrag {
            out.push_str(&format!("a=ice-ufrag:{v}\n"));
        }
        if let Some(v) = &self.ice_pwd {
            out.push_str(&format!("a=ice-pwd:{v}\n"));
        }
        if !self.ice_options.is_empty() {
            out.push_str(&format!("a=ice-options:{}\n", self.ice_options.join(",")));
        }
        if let Some(v) = &self.setup {
            out.push_str(&format!("a=setup:{v}\n"));
        }
        if let Some(v) = &self.fingerprint {
            out.push_str(&format!("a=fingerprint:{v}\n"));
        }
        if let Some(v) = &self.mid {
            out.push_str(&format!("a=mid:{v}\n"));
        }
        if let Some(v) = &self.direction {
            out.push_str(&format!("a={v}\n"));
        }
        for map in &self.rtpmap {
            out.push_str(&format!("a=rtpmap:{map}\n"));
        }
        for candidate in &self.candidates {
            out.push_str(&format!("a=candidate:{candidate}\n"));
        }
        if self.end_of_candidates {
            out.push_str("a=end-of-candidates\n");
        }
        if let Some(ssrc) = &self.ssrc {
            out.push_str(&format!("a=ssrc:{} cname:{}\n", ssrc.id, ssrc.cname));
        }
        for (name, value) in &self.other_attributes {
            match value {
                Some(v) => out.push_str(&format!("a={name}:{v}\n")),
                None => out.push_str(&format!("a={name}\n")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mline_with_payload_types() {
        let media = MediaDescription::parse_mline("video 9 UDP/TLS/RTP/SAVP 97").unwrap();
        assert_eq!(media.media_type, "video");
        assert_eq!(media.port, 9);
        assert_eq!(media.protocol, "UDP/TLS/RTP/SAVP");
        assert_eq!(media.payload_types, vec![97]);
    }

    #[test]
    fn unknown_attribute_is_retained_verbatim() {
        let mut media = MediaDescription::parse_mline("video 9 UDP/TLS/RTP/SAVP 97").unwrap();
        media.apply_attribute("extmap:1 urn:ietf:params:rtp-hdrext:toffset").unwrap();
        assert_eq!(
            media.other_attributes,
            vec![("extmap".to_string(), Some("1 urn:ietf:params:rtp-hdrext:toffset".to_string()))]
        );
    }

    #[test]
    fn ssrc_attribute_parses_cname() {
        let mut media = MediaDescription::parse_mline("video 9 UDP/TLS/RTP/SAVP 97").unwrap();
        media.apply_attribute("ssrc:1399694169 cname:abcd1234").unwrap();
        assert_eq!(media.ssrc, Some(SsrcInfo { id: 1399694169, cname: "abcd1234".to_string() }));
    }
}
