#![warn(rust_2018_idioms)]

pub mod agent;
pub mod candidate;
pub mod checklist;
pub mod connection_state;
pub mod error;

pub use agent::{Agent, AgentConfig, IceRole};
pub use candidate::{CandidateKind, LocalCandidate, RemoteCandidate};
pub use connection_state::ConnectionState;
pub use error::{Error, Result};
