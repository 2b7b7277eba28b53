#![warn(rust_2018_idioms)]

//! WFB-ng-style encrypted/FEC radio ingest: classifies demodulated 802.11
//! frames, authenticates and (when applicable) decrypts them under a
//! session key rotated over an X25519 long-term identity, then reassembles
//! Cauchy Reed-Solomon FEC blocks or dedups a redundant no-FEC stream.

mod config;
mod crypto;
mod dedup;
mod error;
mod fec;
mod frame;
mod link;

pub use config::{StreamKind, WfbLinkConfig};
pub use crypto::{derive_identity, WfbSession, SESSION_ANNOUNCEMENT_LEN};
pub use dedup::{encode_frame as encode_dedup_frame, DedupStream};
pub use error::{Error, Result};
pub use fec::{encode_header as encode_fec_header, BlockStatus, FecBlock, FecReassembler, DEFAULT_RX_QUEUE_MAX_SIZE};
pub use frame::{classify as classify_frame, ClassifiedFrame, SESSION_KEY_MULTIPLEX_INDEX};
pub use link::WfbLink;
