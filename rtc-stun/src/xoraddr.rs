use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::{Error, Result};
use crate::message::{TransactionId, MAGIC_COOKIE};

const FAMILY_IPV4: u8 = 0x01;
const FAMILY_IPV6: u8 = 0x02;

/// Encodes a XOR-MAPPED-ADDRESS attribute value (RFC 5389 §15.2): the port is
/// XORed with the top 16 bits of the magic cookie, and the address is XORed
/// with the magic cookie (IPv4) or magic cookie + transaction id (IPv6).
pub fn encode(addr: SocketAddr, transaction_id: &TransactionId) -> Vec<u8> {
    let cookie_bytes = MAGIC_COOKIE.to_be_bytes();
    let xport = addr.port() ^ (MAGIC_COOKIE >> 16) as u16;

    let mut out = Vec::with_capacity(20);
    match addr.ip() {
        IpAddr::V4(ip) => {
            out.push(0);
            out.push(FAMILY_IPV4);
            out.extend_from_slice(&xport.to_be_bytes());
            let octets = ip.octets();
            for i in 0..4 {
                out.push(octets[i] ^ cookie_bytes[i]);
            }
        }
        IpAddr::V6(ip) => {
            out.push(0);
            out.push(FAMILY_IPV6);
            out.extend_from_slice(&xport.to_be_bytes());
            let octets = ip.octets();
            let mut xor_key = [0u8; 16];
            xor_key[..4].copy_from_slice(&cookie_bytes);
            xor_key[4..].copy_from_slice(&transaction_id.0);
            for i in 0..16 {
                out.push(octets[i] ^ xor_key[i]);
            }
        }
    }
    out
}

pub fn decode(value: &[u8], transaction_id: &TransactionId) -> Result<SocketAddr> {
    if value.len() < 4 {
        return Err(Error::AttributeOverrun);
    }
    let family = value[1];
    let xport = u16::from_be_bytes([value[2], value[3]]);
    let port = xport ^ (MAGIC_COOKIE >> 16) as u16;
    let cookie_bytes = MAGIC_COOKIE.to_be_bytes();

    match family {
        FAMILY_IPV4 => {
            if value.len() < 8 {
                return Err(Error::AttributeOverrun);
            }
            let mut octets = [0u8; 4];
            for i in 0..4 {
                octets[i] = value[4 + i] ^ cookie_bytes[i];
            }
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        FAMILY_IPV6 => {
            if value.len() < 20 {
                return Err(Error::AttributeOverrun);
            }
            let mut xor_key = [0u8; 16];
            xor_key[..4].copy_from_slice(&cookie_bytes);
            xor_key[4..].copy_from_slice(&transaction_id.0);
            let mut octets = [0u8; 16];
            for i in 0..16 {
                octets[i] = value[4 + i] ^ xor_key[i];
            }
            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => Err(Error::UnsupportedAddressFamily),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_roundtrip() {
        let tid = TransactionId::new();
        let addr: SocketAddr = "192.168.1.10:54321".parse().unwrap();
        let encoded = encode(addr, &tid);
        assert_eq!(decode(&encoded, &tid).unwrap(), addr);
    }

    #[test]
    fn ipv6_roundtrip() {
        let tid = TransactionId::new();
        let addr: SocketAddr = "[2001:db8::1]:4242".parse().unwrap();
        let encoded = encode(addr, &tid);
        assert_eq!(decode(&encoded, &tid).unwrap(), addr);
    }
}
