//! Plain serde-annotated configuration structs (C18). No crate in this
//! workspace reads files, environment variables, or argv; a caller supplies
//! these however it likes.

use serde::{Deserialize, Serialize};

use crate::udp_pool::UdpPoolConfig;

/// Default RTP payload type this bridge negotiates for H.264 (dynamic range).
pub const DEFAULT_VIDEO_PAYLOAD_TYPE: u8 = 96;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConnectionConfig {
    pub bind_address: std::net::SocketAddr,
    pub video_payload_type: u8,
    pub video_ssrc: u32,
    pub udp_pool: UdpPoolConfig,
}

impl Default for PeerConnectionConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:0".parse().unwrap(),
            video_payload_type: DEFAULT_VIDEO_PAYLOAD_TYPE,
            video_ssrc: 0,
            udp_pool: UdpPoolConfig::default(),
        }
    }
}
