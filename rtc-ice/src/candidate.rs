use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::{Error, Result};

/// ICE candidate type preference (RFC 8445 §5.1.2.1). This crate gathers and
/// accepts host candidates only; srflx/relay appear here solely so a remote
/// `typ` token can be recognized and rejected with a clear reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Host,
    ServerReflexive,
    PeerReflexive,
    Relay,
}

impl CandidateKind {
    fn type_preference(self) -> u32 {
        match self {
            CandidateKind::Host => 126,
            CandidateKind::PeerReflexive => 110,
            CandidateKind::ServerReflexive => 100,
            CandidateKind::Relay => 0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            CandidateKind::Host => "host",
            CandidateKind::ServerReflexive => "srflx",
            CandidateKind::PeerReflexive => "prflx",
            CandidateKind::Relay => "relay",
        }
    }
}

/// RFC 8445 §5.1.2.1 candidate priority: `(2^24)*type_pref + (2^8)*local_pref +
/// (2^0)*(256 - component_id)`. Component is always 1 (RTP/RTCP-mux).
pub fn candidate_priority(kind: CandidateKind, local_preference: u16) -> u32 {
    (kind.type_preference() << 24) | ((local_preference as u32) << 8) | (256 - 1)
}

/// One locally gathered host candidate, bound to the single RTP/RTCP-mux socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCandidate {
    pub foundation: String,
    pub addr: SocketAddr,
    pub priority: u32,
}

/// Enumerates host candidates: one per up, non-loopback unicast address, all
/// bound to `port` (the single RTP socket). IPv4-mapped-IPv6 addresses are
/// skipped since they duplicate the underlying IPv4 address.
pub fn gather_host_candidates(port: u16) -> Vec<LocalCandidate> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(ifaces) => ifaces,
        Err(e) => {
            log::warn!("ice: failed to enumerate local interfaces: {e}");
            Vec::new()
        }
    };

    let mut candidates = Vec::new();
    for (i, iface) in interfaces.iter().enumerate() {
        if iface.is_loopback() {
            continue;
        }
        let ip = iface.ip();
        if let IpAddr::V6(v6) = ip {
            if let Some(v4) = v6.to_ipv4_mapped() {
                if v4 != Ipv4Addr::UNSPECIFIED {
                    continue;
                }
            }
        }
        if ip.is_unspecified() {
            continue;
        }

        let local_preference = 65535u16.saturating_sub(i as u16);
        candidates.push(LocalCandidate {
            foundation: format!("host{i}"),
            addr: SocketAddr::new(ip, port),
            priority: candidate_priority(CandidateKind::Host, local_preference),
        });
    }

    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    candidates
}

/// A candidate learned from the remote peer, either via SDP `a=candidate` lines
/// or synthesized from a STUN binding request's source address (peer-reflexive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCandidate {
    pub foundation: String,
    pub component: u16,
    pub priority: u32,
    pub addr: SocketAddr,
    pub kind: CandidateKind,
}

impl RemoteCandidate {
    pub fn peer_reflexive(addr: SocketAddr, priority: u32) -> Self {
        RemoteCandidate {
            foundation: format!("prflx-{addr}"),
            component: 1,
            priority,
            addr,
            kind: CandidateKind::PeerReflexive,
        }
    }

    /// Parses an SDP `a=candidate:` attribute value (the part after `candidate:`),
    /// per RFC 8839 §5.1. Only `udp` candidates are accepted; `relay` is rejected
    /// since relay/TURN is out of scope, and hostnames (mDNS `.local`) are
    /// rejected since this crate never resolves them.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 8 {
            return Err(Error::UnparsableCandidate);
        }
        let foundation = fields[0].to_string();
        let component: u16 = fields[1].parse().map_err(|_| Error::UnparsableCandidate)?;
        let protocol = fields[2].to_ascii_lowercase();
        if protocol != "udp" {
            return Err(Error::UnparsableCandidate);
        }
        let priority: u32 = fields[3].parse().map_err(|_| Error::UnparsableCandidate)?;
        let ip: IpAddr = fields[4].parse().map_err(|_| Error::UnparsableCandidate)?;
        let port: u16 = fields[5].parse().map_err(|_| Error::UnparsableCandidate)?;
        if fields[6] != "typ" {
            return Err(Error::UnparsableCandidate);
        }
        let kind = match fields[7] {
            "host" => CandidateKind::Host,
            "srflx" => CandidateKind::ServerReflexive,
            "prflx" => CandidateKind::PeerReflexive,
            "relay" => return Err(Error::UnsupportedCandidateType),
            _ => return Err(Error::UnparsableCandidate),
        };

        Ok(RemoteCandidate {
            foundation,
            component,
            priority,
            addr: SocketAddr::new(ip, port),
            kind,
        })
    }

    pub fn to_sdp_string(&self) -> String {
        format!(
            "{} {} udp {} {} {} typ {}",
            self.foundation,
            self.component,
            self.priority,
            self.addr.ip(),
            self.addr.port(),
            self.kind.as_str()
        )
    }
}
