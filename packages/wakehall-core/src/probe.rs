//! Single-shot ICMP liveness probe.
//!
//! Uses the system `ping` tool with one packet and a one second deadline,
//! and parses its statistics summary. No retries; callers decide whether a
//! device is worth probing again.

use serde::Serialize;

use crate::command;
use crate::error::{Error, Result};

/// Parsed `ping` statistics summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResult {
    pub transmitted: u32,
    pub received: u32,
    /// Percentage packet loss.
    pub loss: u32,
    pub time_ms: u32,
}

impl PingResult {
    /// Whether every transmitted packet came back.
    pub fn succeeded(&self) -> bool {
        self.transmitted == self.received
    }

    /// Parse the summary line out of full `ping` stdout:
    /// `1 packets transmitted, 1 received, 0% packet loss, time 0ms`.
    pub fn parse_summary(output: &str) -> Result<Self> {
        let line = output
            .lines()
            .find(|line| line.contains("packets transmitted"))
            .ok_or_else(|| Error::Parse {
                what: "ping summary",
                line: output.trim().to_string(),
            })?;

        let mut transmitted = None;
        let mut received = None;
        let mut loss = None;
        let mut time_ms = None;

        for field in line.split(',') {
            let field = field.trim();
            if let Some(value) = field.strip_suffix("packets transmitted") {
                transmitted = value.trim().parse().ok();
            } else if let Some(value) = field.strip_suffix("received") {
                received = value.trim().parse().ok();
            } else if let Some(value) = field.strip_suffix("% packet loss") {
                loss = value.trim().parse().ok();
            } else if let Some(value) = field.strip_prefix("time ") {
                time_ms = value.trim().strip_suffix("ms").and_then(|v| v.parse().ok());
            }
        }

        match (transmitted, received, loss, time_ms) {
            (Some(transmitted), Some(received), Some(loss), Some(time_ms)) => Ok(Self {
                transmitted,
                received,
                loss,
                time_ms,
            }),
            _ => Err(Error::Parse {
                what: "ping summary",
                line: line.to_string(),
            }),
        }
    }
}

/// Probe `address` with a single echo request.
///
/// The address goes to the ping tool untouched. `ping` exits non-zero on
/// total loss while still printing a valid summary, so the output is parsed
/// first and the exit status only matters when nothing parses.
pub async fn ping_device(address: &str) -> Result<PingResult> {
    let captured = command::run("ping", &["-c", "1", "-w", "1", address])
        .await
        .map_err(Error::Probe)?;

    match PingResult::parse_summary(&captured.stdout) {
        Ok(result) => Ok(result),
        Err(err) if captured.success => Err(err),
        Err(_) => Err(Error::Probe(format!("no reply summary for {address}"))),
    }
}
