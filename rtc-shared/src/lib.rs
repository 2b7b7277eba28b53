#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod crypto;
pub mod error;
pub mod pool;
pub mod transport;
pub mod util;

pub use crypto::{ExportedSrtpKeys, KeyingMaterialExporter, SrtpKeyingMaterial};
pub use error::{Error, Result};
pub use pool::{Pool, PooledBuf};
pub use transport::{EcnCodepoint, TransportContext, TransportProtocol};
