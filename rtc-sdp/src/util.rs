//! Small helpers shared by the session and media description parsers.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// `a=fingerprint:<hash-function> <hex-digest>` (RFC 8122 §5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash_function: String,
    pub digest: String,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.hash_function, self.digest)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(2, ' ');
        let hash_function = parts.next().filter(|s| !s.is_empty());
        let digest = parts.next().filter(|s| !s.is_empty());
        match (hash_function, digest) {
            (Some(hash_function), Some(digest)) => Ok(Fingerprint {
                hash_function: hash_function.to_string(),
                digest: digest.to_string(),
            }),
            _ => Err(Error::InvalidAttributeValue {
                attr: "fingerprint",
                value: s.to_string(),
            }),
        }
    }
}

impl Fingerprint {
    /// Case-insensitive digest comparison, matching how WebRTC compares the
    /// SDP fingerprint against the DTLS certificate it receives over the wire.
    pub fn digest_matches(&self, other_hex: &str) -> bool {
        self.digest.eq_ignore_ascii_case(other_hex)
    }
}

/// RTP payload-to-codec mapping (`a=rtpmap:<payload> <codec>/<clock-rate>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpMap {
    pub payload_type: u8,
    pub codec: String,
    pub clock_rate: u32,
}

impl fmt::Display for RtpMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.payload_type, self.codec, self.clock_rate)
    }
}

impl FromStr for RtpMap {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(2, ' ');
        let payload_type = parts
            .next()
            .and_then(|s| s.parse::<u8>().ok())
            .ok_or_else(|| Error::InvalidAttributeValue {
                attr: "rtpmap",
                value: s.to_string(),
            })?;
        let codec_rate = parts.next().ok_or_else(|| Error::InvalidAttributeValue {
            attr: "rtpmap",
            value: s.to_string(),
        })?;
        let (codec, rate) = codec_rate.split_once('/').ok_or_else(|| Error::InvalidAttributeValue {
            attr: "rtpmap",
            value: s.to_string(),
        })?;
        let clock_rate = rate
            .parse::<u32>()
            .map_err(|_| Error::InvalidAttributeValue {
                attr: "rtpmap",
                value: s.to_string(),
            })?;
        Ok(RtpMap {
            payload_type,
            codec: codec.to_string(),
            clock_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_parses_and_displays() {
        let fp: Fingerprint = "sha-256 AA:BB:CC".parse().unwrap();
        assert_eq!(fp.hash_function, "sha-256");
        assert_eq!(fp.digest, "AA:BB:CC");
        assert_eq!(fp.to_string(), "sha-256 AA:BB:CC");
    }

    #[test]
    fn fingerprint_digest_comparison_is_case_insensitive() {
        let fp: Fingerprint = "sha-256 aa:bb:cc".parse().unwrap();
        assert!(fp.digest_matches("AA:BB:CC"));
    }

    #[test]
    fn rtpmap_parses_h264() {
        let map: RtpMap = "97 H264/90000".parse().unwrap();
        assert_eq!(map.payload_type, 97);
        assert_eq!(map.codec, "H264");
        assert_eq!(map.clock_rate, 90000);
        assert_eq!(map.to_string(), "97 H264/90000");
    }

    #[test]
    fn rtpmap_rejects_malformed_value() {
        assert!("not-a-rtpmap".parse::<RtpMap>().is_err());
    }
}
