use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("ice: checklist is full")]
    ChecklistFull,
    #[error("ice: no nominated pair")]
    NoNominatedPair,
    #[error("ice: remote candidate address family does not match local")]
    AddressFamilyMismatch,
    #[error("ice: remote candidate could not be parsed")]
    UnparsableCandidate,
    #[error("ice: remote candidate uses an unsupported type (relay)")]
    UnsupportedCandidateType,
    #[error("ice: channel is closed")]
    Closed,
}
