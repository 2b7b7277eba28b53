#![warn(rust_2018_idioms)]

pub mod cert;
pub mod conn;
pub mod error;
pub mod handshake;
pub mod prf;
pub mod protect;
pub mod queue;
pub mod record;

pub use cert::Certificate;
pub use conn::{DtlsTransport, Role};
pub use error::{Error, Result};
