use std::fmt;

/// The ICE channel's connection state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not yet gathering.
    New,
    /// Gathering complete, exchanging connectivity checks.
    Checking,
    /// A nominated pair has succeeded; media can flow.
    Connected,
    /// Was connected; the nominated pair has gone quiet past `DISCONNECTED_TIMEOUT`.
    Disconnected,
    /// No viable pair within `FAILED_TIMEOUT`, or the nominated pair has gone
    /// quiet past it.
    Failed,
    /// Closed; no further checks run. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::New => "New",
            Self::Checking => "Checking",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Failed => "Failed",
            Self::Closed => "Closed",
        };
        write!(f, "{s}")
    }
}
