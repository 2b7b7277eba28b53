//! WebRTC video egress bridge: a single RTP/H.264 track, ICE/DTLS/SRTP, and
//! the WFB-ng-style encrypted radio ingest path, wired into one peer
//! connection type.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod demux;
pub mod error;
pub mod media;
pub mod peer_connection;
pub mod udp_pool;
pub mod wfb_bridge;

pub use config::PeerConnectionConfig;
pub use demux::{classify as classify_datagram, Datagram};
pub use error::{Error, Result, SignalingError};
pub use media::{send_video, VideoTrack};
pub use peer_connection::{ConnectionEvent, PeerConnection, PeerConnectionState};
pub use udp_pool::{UdpIoPool, UdpPoolConfig};
pub use wfb_bridge::feed_wfb_frame;
