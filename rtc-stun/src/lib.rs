#![warn(rust_2018_idioms)]

pub mod attributes;
pub mod error;
pub mod fingerprint;
pub mod integrity;
pub mod message;
pub mod xoraddr;

pub use error::{Error, Result};
pub use message::{Message, MessageClass, MessageType, TransactionId};
