use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("sdp: malformed line {0:?}")]
    MalformedLine(String),
    #[error("sdp: field {0:?} on this line is not a valid integer")]
    InvalidInteger(String),
    #[error("sdp: attribute {attr} has an unrecognized value {value:?}")]
    InvalidAttributeValue { attr: &'static str, value: String },
    #[error("sdp: an attribute line appeared before any m= line or session header")]
    AttributeBeforeSession,
    #[error("sdp: session description has no media sections")]
    NoMediaDescriptions,
}
