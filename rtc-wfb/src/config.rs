//! Plain serde-annotated configuration (C18). The crate reads no files,
//! environment variables, or argv; a caller populates this however it likes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fec::DEFAULT_RX_QUEUE_MAX_SIZE;

/// How a given multiplex index's payloads are reassembled downstream of
/// link crypto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Fec,
    NoFec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WfbLinkConfig {
    /// Shared secret both ends derive their long-term X25519 identity from.
    pub bind_phrase: String,
    /// Per-user-stream routing: multiplex index -> FEC or dedup handling.
    /// The NIC/radio list is external; this crate receives frames already
    /// demodulated.
    pub streams: HashMap<u8, StreamKind>,
    pub rx_queue_max_size: usize,
}

impl Default for WfbLinkConfig {
    fn default() -> Self {
        Self {
            bind_phrase: String::new(),
            streams: HashMap::new(),
            rx_queue_max_size: DEFAULT_RX_QUEUE_MAX_SIZE,
        }
    }
}
