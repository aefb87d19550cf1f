//! Wake-on-LAN magic packet construction and sending.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use tokio::net::UdpSocket;

use crate::error::{Error, Result};

/// Default Wake-on-LAN UDP port.
pub const DEFAULT_WAKE_PORT: u16 = 9;

/// Default IPv4 limited-broadcast destination.
pub const DEFAULT_BROADCAST: IpAddr = IpAddr::V4(Ipv4Addr::BROADCAST);

const MAC_LEN: usize = 6;
const MAC_REPEAT: usize = 16;
const PACKET_LEN: usize = MAC_LEN + MAC_LEN * MAC_REPEAT;

/// A six-byte hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; MAC_LEN]);

impl MacAddress {
    pub fn octets(&self) -> [u8; MAC_LEN] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    /// Accepts `11:22:33:44:55:66`, `11-22-33-44-55-66`, and bare
    /// `112233445566`, case-insensitive. Anything that is not exactly six
    /// hex byte pairs is malformed.
    fn from_str(s: &str) -> Result<Self> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.len() != MAC_LEN * 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::MalformedMac(s.to_string()));
        }

        let mut octets = [0u8; MAC_LEN];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::MalformedMac(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Build the canonical magic packet: six bytes of 0xFF, then the hardware
/// address sixteen times.
pub fn magic_packet(mac: MacAddress) -> [u8; PACKET_LEN] {
    let mut packet = [0xFF; PACKET_LEN];
    for repeat in 0..MAC_REPEAT {
        let start = MAC_LEN + repeat * MAC_LEN;
        packet[start..start + MAC_LEN].copy_from_slice(&mac.octets());
    }
    packet
}

/// Destination options for [`wake`].
#[derive(Debug, Clone)]
pub struct WakeOptions {
    pub broadcast_address: IpAddr,
    pub port: u16,
}

impl Default for WakeOptions {
    fn default() -> Self {
        Self {
            broadcast_address: DEFAULT_BROADCAST,
            port: DEFAULT_WAKE_PORT,
        }
    }
}

/// Send a magic packet for `mac`.
///
/// The hardware address is validated before any socket is opened. Returns
/// whether the whole packet went out in one datagram; socket errors
/// propagate as [`Error::Wake`].
pub async fn wake(mac: &str, options: WakeOptions) -> Result<bool> {
    let mac: MacAddress = mac.parse()?;
    let packet = magic_packet(mac);

    tracing::debug!(
        "sending magic packet for {mac} to {}:{}",
        options.broadcast_address,
        options.port
    );

    let bind_addr = match options.broadcast_address {
        IpAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        IpAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };

    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|err| Error::Wake(err.to_string()))?;
    socket
        .set_broadcast(true)
        .map_err(|err| Error::Wake(err.to_string()))?;

    let destination = SocketAddr::from((options.broadcast_address, options.port));
    let sent = socket
        .send_to(&packet, destination)
        .await
        .map_err(|err| Error::Wake(err.to_string()))?;

    Ok(sent == PACKET_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_is_header_plus_sixteen_repetitions() {
        let mac: MacAddress = "11:22:33:44:55:66".parse().unwrap();
        let packet = magic_packet(mac);

        assert_eq!(packet.len(), 102);
        assert!(packet[..6].iter().all(|byte| *byte == 0xFF));
        for repeat in 0..16 {
            let start = 6 + repeat * 6;
            assert_eq!(&packet[start..start + 6], &mac.octets());
        }
    }

    #[test]
    fn parses_separator_variants() {
        let colon: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let dash: MacAddress = "AA-BB-CC-DD-EE-FF".parse().unwrap();
        let bare: MacAddress = "aabbccddeeff".parse().unwrap();

        assert_eq!(colon, dash);
        assert_eq!(colon, bare);
        assert_eq!(colon.octets(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[test]
    fn displays_lowercase_colon_form() {
        let mac: MacAddress = "AA-BB-CC-00-01-02".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:00:01:02");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in [
            "",
            "11:22:33:44:55",
            "11:22:33:44:55:66:77",
            "11:22:33:44:55:6g",
            "hello world",
            "11 22 33 44 55 66",
        ] {
            assert!(
                bad.parse::<MacAddress>().is_err(),
                "{bad:?} should not parse"
            );
        }
    }

    #[tokio::test]
    async fn wake_rejects_malformed_address_before_sending() {
        let result = wake("not-a-mac", WakeOptions::default()).await;
        assert!(matches!(result, Err(Error::MalformedMac(_))));
    }
}
