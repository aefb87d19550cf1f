//! Local device discovery via connect-probing and the ARP cache.
//!
//! The sweep deliberately does not read the neighbour table the resolver
//! uses: it nudges the kernel into refreshing its ARP cache by opening (and
//! immediately abandoning) a TCP connection to every candidate address,
//! then parses the `arp` tool's table. Useful for spotting devices that are
//! on the network but not in the configured registry.
//!
//! Overlapping scans for the same target share one run through
//! [`SingleFlight`], so a slow sweep cannot be stampeded.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use ipnetwork::Ipv4Network;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::command;
use crate::error::{Error, Result};
use crate::singleflight::SingleFlight;

/// Name used when the ARP table has no hostname for an entry.
pub const UNRESOLVED_NAME: &str = "?";

/// Port probed to provoke an ARP cache refresh. Whether anything listens
/// there is irrelevant; refusal updates the cache just as well.
const PROBE_PORT: u16 = 80;
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);
const PROBE_BATCH: usize = 64;

/// Refuse to sweep targets larger than this many hosts.
const MAX_SWEEP_HOSTS: usize = 65_536;

/// A device observed in the ARP table (not necessarily configured).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDevice {
    pub name: String,
    pub ip: String,
    pub mac: String,
}

/// Outcome of a local scan: a sweep yields a listing, a single-address
/// lookup yields at most one entry ("no entry" is a normal empty result,
/// not a failure).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScanReport {
    Sweep(Vec<LocalDevice>),
    Single(Option<LocalDevice>),
}

/// Options for [`LocalScanner::find`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Empty for a full sweep of the local subnets, a CIDR block or dash
    /// range to restrict the sweep, or one concrete address.
    pub address: String,
    /// Pass `-n` style flags to the ARP tool instead of resolving names.
    pub skip_name_resolution: bool,
    /// Path of the ARP tool, for hosts where it is not simply `arp`.
    pub arp_tool: Option<String>,
}

/// Local device scanner with per-target single-flight de-duplication.
pub struct LocalScanner {
    inflight: Arc<SingleFlight<Result<ScanReport>>>,
}

impl LocalScanner {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(SingleFlight::new()),
        }
    }

    /// Find devices on the local network.
    ///
    /// Concurrent calls for the same target are resolved by the same scan;
    /// the lock entry is cleared once the scan settles, whatever the
    /// outcome.
    pub async fn find(&self, options: FindOptions) -> Result<ScanReport> {
        let key = options.address.clone();
        self.inflight.run(&key, scan(options)).await
    }

    /// Number of scans currently in flight.
    pub fn scans_in_flight(&self) -> usize {
        self.inflight.in_flight()
    }
}

impl Default for LocalScanner {
    fn default() -> Self {
        Self::new()
    }
}

async fn scan(options: FindOptions) -> Result<ScanReport> {
    let arp_tool = options.arp_tool.as_deref().unwrap_or("arp").to_string();

    if options.address.is_empty() || is_range(&options.address) {
        let candidates = if is_range(&options.address) {
            expand_range(&options.address)?
        } else {
            local_subnet_hosts().await?
        };
        if candidates.len() > MAX_SWEEP_HOSTS {
            return Err(Error::Scan(format!(
                "sweep of {} hosts is larger than the {MAX_SWEEP_HOSTS} host limit",
                candidates.len()
            )));
        }

        sweep(&candidates, options.skip_name_resolution, &arp_tool)
            .await
            .map(ScanReport::Sweep)
    } else {
        lookup_single(&options.address, &arp_tool)
            .await
            .map(ScanReport::Single)
    }
}

/// Sweep every candidate address, then read back the ARP table filtered to
/// the candidate set.
async fn sweep(
    candidates: &[Ipv4Addr],
    skip_name_resolution: bool,
    arp_tool: &str,
) -> Result<Vec<LocalDevice>> {
    tracing::debug!("connect-probing {} candidate hosts", candidates.len());
    for batch in candidates.chunks(PROBE_BATCH) {
        join_all(batch.iter().map(|addr| probe_host(IpAddr::V4(*addr)))).await;
    }

    let args: &[&str] = if skip_name_resolution { &["-an"] } else { &["-a"] };
    let captured = command::run(arp_tool, args).await.map_err(Error::Scan)?;
    if !captured.success {
        return Err(Error::Scan(format!("{arp_tool} exited with an error")));
    }

    let wanted: HashSet<String> = candidates.iter().map(|addr| addr.to_string()).collect();
    let mut devices = Vec::new();
    for row in captured.stdout.lines() {
        if let Some(device) = parse_table_row(row)? {
            if wanted.contains(&device.ip) {
                devices.push(device);
            }
        }
    }

    tracing::debug!("found {} devices in the ARP table", devices.len());
    Ok(devices)
}

/// Probe one address, then ask the ARP tool about it alone.
async fn lookup_single(address: &str, arp_tool: &str) -> Result<Option<LocalDevice>> {
    let addr: IpAddr = address
        .parse()
        .map_err(|_| Error::Scan(format!("invalid address {address:?}")))?;
    probe_host(addr).await;

    let captured = command::run(arp_tool, &["-n", address])
        .await
        .map_err(Error::Scan)?;
    if captured.stdout.contains("no entry") {
        return Ok(None);
    }
    if !captured.success {
        return Err(Error::Scan(format!("{arp_tool} exited with an error")));
    }

    // The first row only carries column headings.
    let row = captured.stdout.lines().nth(1).unwrap_or("");
    parse_single_row(row)
}

/// Open and abandon a TCP connection so the kernel refreshes its ARP entry.
async fn probe_host(addr: IpAddr) {
    let _ = timeout(PROBE_TIMEOUT, TcpStream::connect((addr, PROBE_PORT))).await;
}

/// Parse one row of the full-table form:
/// `pc.lan (192.168.1.40) at 11:22:33:44:55:66 [ether] on wlan0`.
///
/// Blank rows and unresolved hosts are skipped, not errors.
fn parse_table_row(row: &str) -> Result<Option<LocalDevice>> {
    let row = row.trim();
    if row.is_empty() || row.contains("incomplete") || row.contains("no entry") {
        return Ok(None);
    }

    let chunks: Vec<&str> = row.split_whitespace().collect();
    if chunks.len() < 4 {
        return Err(Error::Parse {
            what: "arp table",
            line: row.to_string(),
        });
    }
    let ip = chunks[1]
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .ok_or_else(|| Error::Parse {
            what: "arp table",
            line: row.to_string(),
        })?;

    Ok(Some(LocalDevice {
        name: chunks[0].to_string(),
        ip: ip.to_string(),
        mac: chunks[3].to_string(),
    }))
}

/// Parse the single-entry form (the row after the header):
/// `192.168.1.40  ether  11:22:33:44:55:66  C  wlan0`.
///
/// No hostname column in this form, hence the `?` sentinel.
fn parse_single_row(row: &str) -> Result<Option<LocalDevice>> {
    let row = row.trim();
    if row.is_empty() || row.contains("incomplete") {
        return Ok(None);
    }

    let chunks: Vec<&str> = row.split_whitespace().collect();
    if chunks.len() < 3 {
        return Err(Error::Parse {
            what: "arp table",
            line: row.to_string(),
        });
    }

    Ok(Some(LocalDevice {
        name: UNRESOLVED_NAME.to_string(),
        ip: chunks[0].to_string(),
        mac: chunks[2].to_string(),
    }))
}

/// A target is a range when it carries a CIDR slash or a dash span.
fn is_range(address: &str) -> bool {
    !address.is_empty() && (address.contains('/') || address.contains('-'))
}

/// Expand a CIDR block or `a.b.c.d-a.b.c.e` span into candidate addresses.
fn expand_range(address: &str) -> Result<Vec<Ipv4Addr>> {
    if let Some((start, end)) = address.split_once('-') {
        let start: Ipv4Addr = start.trim().parse().map_err(|_| bad_range(address))?;
        let end: Ipv4Addr = end.trim().parse().map_err(|_| bad_range(address))?;
        let (start, end) = (u32::from(start), u32::from(end));
        if start > end || (end - start) as usize >= MAX_SWEEP_HOSTS {
            return Err(bad_range(address));
        }
        return Ok((start..=end).map(Ipv4Addr::from).collect());
    }

    let network: Ipv4Network = address.parse().map_err(|_| bad_range(address))?;
    if network.size() as usize > MAX_SWEEP_HOSTS {
        return Err(bad_range(address));
    }
    Ok(usable_hosts(network))
}

fn bad_range(address: &str) -> Error {
    Error::Scan(format!("invalid scan range {address:?}"))
}

/// Host addresses of a subnet, network and broadcast excluded.
fn usable_hosts(network: Ipv4Network) -> Vec<Ipv4Addr> {
    if network.prefix() >= 31 {
        // Point-to-point blocks have no network/broadcast split.
        return network.iter().collect();
    }
    let base = u32::from(network.network());
    let broadcast = u32::from(network.broadcast());
    ((base + 1)..broadcast).map(Ipv4Addr::from).collect()
}

/// Candidate addresses across every non-loopback IPv4 interface, read from
/// `ip -4 -o addr show`.
async fn local_subnet_hosts() -> Result<Vec<Ipv4Addr>> {
    let captured = command::run("ip", &["-4", "-o", "addr", "show"])
        .await
        .map_err(Error::Scan)?;
    if !captured.success {
        return Err(Error::Scan("ip addr show exited with an error".to_string()));
    }

    Ok(parse_interface_hosts(&captured.stdout))
}

/// Parse `ip -4 -o addr show` lines:
/// `2: wlan0    inet 192.168.1.17/24 brd 192.168.1.255 scope global ...`.
fn parse_interface_hosts(output: &str) -> Vec<Ipv4Addr> {
    let mut hosts = Vec::new();
    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 || tokens[2] != "inet" {
            continue;
        }
        if tokens[1] == "lo" {
            continue;
        }
        let Ok(network) = tokens[3].parse::<Ipv4Network>() else {
            continue;
        };
        if network.ip().is_loopback() {
            continue;
        }
        hosts.extend(usable_hosts(network));
    }
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_table_row() {
        let device = parse_table_row("pc.lan (192.168.1.40) at 11:22:33:44:55:66 [ether] on wlan0")
            .unwrap()
            .unwrap();

        assert_eq!(device.name, "pc.lan");
        assert_eq!(device.ip, "192.168.1.40");
        assert_eq!(device.mac, "11:22:33:44:55:66");
    }

    #[test]
    fn full_table_row_keeps_unresolved_sentinel() {
        let device = parse_table_row("? (192.168.1.41) at aa:bb:cc:dd:ee:ff [ether] on eth0")
            .unwrap()
            .unwrap();

        assert_eq!(device.name, UNRESOLVED_NAME);
    }

    #[test]
    fn skips_blank_and_incomplete_rows() {
        assert!(parse_table_row("").unwrap().is_none());
        assert!(
            parse_table_row("? (192.168.1.9) at <incomplete> on wlan0")
                .unwrap()
                .is_none()
        );
        assert!(parse_single_row("").unwrap().is_none());
    }

    #[test]
    fn rejects_short_table_row() {
        assert!(parse_table_row("pc.lan (192.168.1.40) at").is_err());
    }

    #[test]
    fn rejects_row_without_parenthesised_address() {
        assert!(parse_table_row("pc.lan 192.168.1.40 at 11:22:33:44:55:66").is_err());
    }

    #[test]
    fn parses_single_row_form() {
        let device = parse_single_row("192.168.1.40   ether   11:22:33:44:55:66   C   wlan0")
            .unwrap()
            .unwrap();

        assert_eq!(device.name, UNRESOLVED_NAME);
        assert_eq!(device.ip, "192.168.1.40");
        assert_eq!(device.mac, "11:22:33:44:55:66");
    }

    #[test]
    fn detects_ranges() {
        assert!(is_range("192.168.1.0/24"));
        assert!(is_range("192.168.1.10-192.168.1.20"));
        assert!(!is_range("192.168.1.10"));
        assert!(!is_range(""));
    }

    #[test]
    fn expands_dash_range_inclusive() {
        let hosts = expand_range("192.168.1.10-192.168.1.12").unwrap();
        assert_eq!(
            hosts,
            vec![
                Ipv4Addr::new(192, 168, 1, 10),
                Ipv4Addr::new(192, 168, 1, 11),
                Ipv4Addr::new(192, 168, 1, 12),
            ]
        );
    }

    #[test]
    fn expands_cidr_without_network_and_broadcast() {
        let hosts = expand_range("192.168.1.0/24").unwrap();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(hosts[253], Ipv4Addr::new(192, 168, 1, 254));
    }

    #[test]
    fn rejects_backwards_and_garbled_ranges() {
        assert!(expand_range("192.168.1.20-192.168.1.10").is_err());
        assert!(expand_range("not-a-range").is_err());
    }

    #[test]
    fn interface_parsing_skips_loopback() {
        let output = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
2: wlan0    inet 192.168.1.17/30 brd 192.168.1.19 scope global dynamic wlan0\\       valid_lft 85000sec preferred_lft 85000sec
";
        let hosts = parse_interface_hosts(output);
        assert_eq!(
            hosts,
            vec![Ipv4Addr::new(192, 168, 1, 17), Ipv4Addr::new(192, 168, 1, 18)]
        );
    }
}
