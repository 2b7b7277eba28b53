#![warn(rust_2018_idioms)]

pub mod depacketizer;
pub mod error;
pub mod nal;

pub use depacketizer::{Depacketizer, Frame};
pub use error::{Error, Result};
pub use nal::NalUnitType;
