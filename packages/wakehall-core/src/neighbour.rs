//! Neighbour table reading.
//!
//! Wraps the OS neighbour cache (`ip neigh show`) behind a structured,
//! per-line parser. This is the passive half of liveness resolution: a
//! REACHABLE entry is authoritative, anything else only supplies a
//! candidate address for an active probe.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command;
use crate::error::{Error, Result};

/// Reachability state of a neighbour cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeighbourState {
    Permanent,
    Noarp,
    Reachable,
    Stale,
    None,
    Incomplete,
    Delay,
    Probe,
    Failed,
}

impl FromStr for NeighbourState {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self> {
        match token {
            "PERMANENT" => Ok(Self::Permanent),
            "NOARP" => Ok(Self::Noarp),
            "REACHABLE" => Ok(Self::Reachable),
            "STALE" => Ok(Self::Stale),
            "NONE" => Ok(Self::None),
            "INCOMPLETE" => Ok(Self::Incomplete),
            "DELAY" => Ok(Self::Delay),
            "PROBE" => Ok(Self::Probe),
            "FAILED" => Ok(Self::Failed),
            _ => Err(Error::Parse {
                what: "neighbour state",
                line: token.to_string(),
            }),
        }
    }
}

/// One entry of the neighbour table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbour {
    pub ip_address: String,
    pub net_interface: String,
    pub mac_address: String,
    pub state: NeighbourState,
    pub is_router: bool,
}

impl Neighbour {
    /// Parse one line of `ip neigh show` output.
    ///
    /// Two shapes occur:
    /// `192.168.1.40 dev wlan0 lladdr 11:22:33:44:55:66 STALE`
    /// `fe80::1 dev wlan0 lladdr 11:22:33:44:55:66 router REACHABLE`
    ///
    /// Any other token count fails the parse rather than producing a
    /// partially populated entry.
    pub fn parse_line(line: &str) -> Result<Self> {
        let parse_err = || Error::Parse {
            what: "neighbour table",
            line: line.to_string(),
        };

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (is_router, state_token) = match tokens.len() {
            6 => (false, tokens[5]),
            7 if tokens[5] == "router" => (true, tokens[6]),
            _ => return Err(parse_err()),
        };
        if tokens[1] != "dev" || tokens[3] != "lladdr" {
            return Err(parse_err());
        }

        Ok(Self {
            ip_address: tokens[0].to_string(),
            net_interface: tokens[2].to_string(),
            mac_address: tokens[4].to_string(),
            state: state_token.parse()?,
            is_router,
        })
    }

    /// Parse a full block of neighbour-show output, skipping blank lines.
    pub fn parse_lines(output: &str) -> Result<Vec<Self>> {
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(Self::parse_line)
            .collect()
    }
}

/// Read the current neighbour table.
///
/// No retries; callers decide whether a failed scan is worth repeating.
pub async fn scan_devices() -> Result<Vec<Neighbour>> {
    let captured = command::run("ip", &["neigh", "show"])
        .await
        .map_err(Error::Scan)?;
    if !captured.success {
        return Err(Error::Scan("ip neigh show exited with an error".to_string()));
    }

    Neighbour::parse_lines(&captured.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_entry() {
        let parsed =
            Neighbour::parse_line("192.168.1.1 dev wlan0 lladdr 11:22:33:44:55:66 STALE").unwrap();

        assert_eq!(parsed.ip_address, "192.168.1.1");
        assert_eq!(parsed.net_interface, "wlan0");
        assert_eq!(parsed.mac_address, "11:22:33:44:55:66");
        assert!(!parsed.is_router);
        assert_eq!(parsed.state, NeighbourState::Stale);
    }

    #[test]
    fn parses_router_entry() {
        let parsed =
            Neighbour::parse_line("fe80::1 dev wlan0 lladdr 11:22:33:44:55:66 router REACHABLE")
                .unwrap();

        assert_eq!(parsed.ip_address, "fe80::1");
        assert_eq!(parsed.net_interface, "wlan0");
        assert_eq!(parsed.mac_address, "11:22:33:44:55:66");
        assert!(parsed.is_router);
        assert_eq!(parsed.state, NeighbourState::Reachable);
    }

    #[test]
    fn rejects_wrong_token_count() {
        assert!(Neighbour::parse_line("192.168.1.50 dev wlan0 INCOMPLETE").is_err());
        assert!(Neighbour::parse_line("").is_err());
        assert!(
            Neighbour::parse_line("192.168.1.1 dev wlan0 lladdr 11:22:33:44:55:66 STALE extra")
                .is_err()
        );
    }

    #[test]
    fn rejects_unknown_state() {
        assert!(
            Neighbour::parse_line("192.168.1.1 dev wlan0 lladdr 11:22:33:44:55:66 DOZING").is_err()
        );
    }

    #[test]
    fn parses_multiple_lines_and_skips_blanks() {
        let output = "192.168.1.1 dev eth0 lladdr aa:bb:cc:dd:ee:ff REACHABLE\n\
                      \n\
                      192.168.1.2 dev eth0 lladdr 11:22:33:44:55:66 router DELAY\n";
        let entries = Neighbour::parse_lines(output).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].state, NeighbourState::Reachable);
        assert!(entries[1].is_router);
    }

    #[test]
    fn entries_serialize_with_screaming_states() {
        let entry =
            Neighbour::parse_line("192.168.1.1 dev wlan0 lladdr 11:22:33:44:55:66 STALE").unwrap();
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["state"], "STALE");
        assert_eq!(value["isRouter"], false);
        assert_eq!(value["ipAddress"], "192.168.1.1");
        assert_eq!(value["netInterface"], "wlan0");
        assert_eq!(value["macAddress"], "11:22:33:44:55:66");
    }

    #[test]
    fn one_bad_line_fails_the_block() {
        let output = "192.168.1.1 dev eth0 lladdr aa:bb:cc:dd:ee:ff REACHABLE\n\
                      garbage\n";
        assert!(Neighbour::parse_lines(output).is_err());
    }
}
