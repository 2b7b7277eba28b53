use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Media stream status (RFC 4566 §6.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::SendRecv => "sendrecv",
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
            Direction::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sendrecv" => Ok(Direction::SendRecv),
            "sendonly" => Ok(Direction::SendOnly),
            "recvonly" => Ok(Direction::RecvOnly),
            "inactive" => Ok(Direction::Inactive),
            _ => Err(Error::InvalidAttributeValue {
                attr: "direction",
                value: s.to_string(),
            }),
        }
    }
}

/// DTLS setup role (RFC 4145 §4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setup {
    Active,
    Passive,
    ActPass,
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Setup::Active => "active",
            Setup::Passive => "passive",
            Setup::ActPass => "actpass",
        };
        f.write_str(s)
    }
}

impl FromStr for Setup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Setup::Active),
            "passive" => Ok(Setup::Passive),
            "actpass" => Ok(Setup::ActPass),
            _ => Err(Error::InvalidAttributeValue {
                attr: "setup",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_roundtrips_through_display_and_parse() {
        for d in [Direction::SendRecv, Direction::SendOnly, Direction::RecvOnly, Direction::Inactive] {
            assert_eq!(d.to_string().parse::<Direction>().unwrap(), d);
        }
    }

    #[test]
    fn setup_roundtrips_through_display_and_parse() {
        for s in [Setup::Active, Setup::Passive, Setup::ActPass] {
            assert_eq!(s.to_string().parse::<Setup>().unwrap(), s);
        }
    }

    #[test]
    fn unknown_direction_is_rejected() {
        assert!("sendback".parse::<Direction>().is_err());
    }
}
