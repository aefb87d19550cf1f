//! Configured devices and awakability resolution.
//!
//! The registry is an immutable, position-indexed list built from
//! configuration at startup and handed to the adapters explicitly; the
//! index doubles as the device id used by the wake endpoints. Liveness is
//! computed fresh on every query, never cached.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::neighbour::{self, Neighbour, NeighbourState};
use crate::probe::{self, PingResult};
use crate::wol::{self, MacAddress, WakeOptions};

/// Prerequisite that must be woken before its dependent device, e.g. a
/// smart plug that has to supply mains power before the NIC behind it can
/// hear a magic packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WakeDependency {
    /// Hardware address of the device to wake first.
    pub device: String,
    /// Seconds to wait before waking the dependent device.
    pub delay: u64,
}

/// One configured device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub mac: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Fallback address probed when the device is absent from the
    /// neighbour table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require: Option<WakeDependency>,
}

/// Immutable, position-indexed device list.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    /// Build a registry, validating every hardware address and rejecting
    /// duplicates. The hardware address is the registry's primary key.
    pub fn new(devices: Vec<Device>) -> Result<Self> {
        let mut seen = HashSet::new();
        for device in &devices {
            let mac: MacAddress = device.mac.parse().map_err(|_| {
                Error::Config(format!(
                    "device {:?} has a malformed hardware address {:?}",
                    device.name, device.mac
                ))
            })?;
            if !seen.insert(mac) {
                return Err(Error::Config(format!(
                    "duplicate hardware address {:?}",
                    device.mac
                )));
            }
            if let Some(require) = &device.require {
                require.device.parse::<MacAddress>().map_err(|_| {
                    Error::Config(format!(
                        "device {:?} requires a malformed hardware address {:?}",
                        device.name, require.device
                    ))
                })?;
            }
        }
        Ok(Self { devices })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device at `id`, the position in the configured list.
    pub fn get(&self, id: usize) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Case-insensitive display-name lookup; first match wins.
    pub fn find_by_name(&self, name: &str) -> Option<(usize, &Device)> {
        self.devices
            .iter()
            .enumerate()
            .find(|(_, device)| device.name.eq_ignore_ascii_case(name))
    }
}

/// A registry device annotated with its computed liveness. Derived per
/// request and never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwakableDevice {
    pub id: usize,
    pub mac: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub awake: bool,
}

impl AwakableDevice {
    fn from_device(id: usize, device: &Device, awake: bool) -> Self {
        Self {
            id,
            mac: device.mac.clone(),
            name: device.name.clone(),
            desc: device.desc.clone(),
            link: device.link.clone(),
            awake,
        }
    }

    /// One-line rendering for chat and CLI listings.
    pub fn name_and_status(&self) -> String {
        if self.awake {
            format!("{} [up]", self.name)
        } else {
            format!("{} [down]", self.name)
        }
    }
}

/// What the neighbour snapshot alone says about a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessDecision {
    /// Present with a REACHABLE entry; authoritative, no probe needed.
    Awake,
    /// No address to probe; conclusively unreachable with the tools at hand.
    Asleep,
    /// Probe this address to decide.
    Probe(String),
}

/// Evaluate one device against a neighbour snapshot.
///
/// The neighbour's address wins over the configured fallback whatever its
/// state: the table knows where the device was last seen.
pub fn liveness_decision(neighbours: &[Neighbour], device: &Device) -> LivenessDecision {
    let mac = device.mac.parse::<MacAddress>().ok();
    let entry = neighbours.iter().find(|neighbour| {
        neighbour
            .mac_address
            .parse::<MacAddress>()
            .ok()
            .zip(mac)
            .is_some_and(|(a, b)| a == b)
    });

    if let Some(entry) = entry {
        if entry.state == NeighbourState::Reachable {
            return LivenessDecision::Awake;
        }
    }

    match entry
        .map(|entry| entry.ip_address.clone())
        .or_else(|| device.static_ip_address.clone())
    {
        Some(address) => LivenessDecision::Probe(address),
        None => LivenessDecision::Asleep,
    }
}

/// Annotate every registry device with its liveness, evaluated against one
/// consistent neighbour snapshot.
///
/// Devices are probed concurrently but the result preserves registry
/// order. A failed probe downgrades to "not awake" with a warning instead
/// of failing the whole listing.
pub async fn evaluate_devices<P, Fut>(
    registry: &DeviceRegistry,
    neighbours: &[Neighbour],
    probe: P,
) -> Vec<AwakableDevice>
where
    P: Fn(String) -> Fut,
    Fut: Future<Output = Result<PingResult>>,
{
    let probe = &probe;
    let checks = registry
        .devices()
        .iter()
        .enumerate()
        .map(move |(id, device)| async move {
            let awake = match liveness_decision(neighbours, device) {
                LivenessDecision::Awake => true,
                LivenessDecision::Asleep => false,
                LivenessDecision::Probe(address) => match probe(address.clone()).await {
                    Ok(result) => result.succeeded(),
                    Err(err) => {
                        tracing::warn!("probe of {} at {} failed: {}", device.name, address, err);
                        false
                    }
                },
            };
            AwakableDevice::from_device(id, device, awake)
        });

    join_all(checks).await
}

/// Scan the neighbour table once and annotate every configured device.
pub async fn list_awakable(registry: &DeviceRegistry) -> Result<Vec<AwakableDevice>> {
    let neighbours = neighbour::scan_devices().await?;
    Ok(evaluate_devices(registry, &neighbours, |address| async move {
        probe::ping_device(&address).await
    })
    .await)
}

/// Wake `device` through `send_wake`, honouring its dependency chain.
///
/// With a dependency, the prerequisite's wake is awaited before returning
/// and the device's own wake is detached: it fires after the configured
/// delay whether or not the caller is still around. Without one, the
/// device is woken directly and the send awaited.
pub async fn wake_device_with<W, Fut>(device: &Device, send_wake: W) -> Result<bool>
where
    W: Fn(String) -> Fut + Send + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    match &device.require {
        Some(require) => {
            let sent = send_wake(require.device.clone()).await?;

            let mac = device.mac.clone();
            let name = device.name.clone();
            let delay = Duration::from_secs(require.delay);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                match send_wake(mac).await {
                    Ok(true) => tracing::debug!("delayed wake sent for {name}"),
                    Ok(false) => tracing::warn!("delayed magic packet for {name} was truncated"),
                    Err(err) => tracing::error!("delayed wake of {name} failed: {err}"),
                }
            });

            Ok(sent)
        }
        None => send_wake(device.mac.clone()).await,
    }
}

/// Wake `device` with the default broadcast destination.
pub async fn wake_device(device: &Device) -> Result<bool> {
    wake_device_with(device, |mac| async move {
        wol::wake(&mac, WakeOptions::default()).await
    })
    .await
}

/// Wake the device at `id`; an index past the end of the registry is
/// `NotFound`, never a transport failure.
pub async fn wake_by_id(registry: &DeviceRegistry, id: usize) -> Result<bool> {
    let device = registry
        .get(id)
        .ok_or_else(|| Error::NotFound(format!("device {id}")))?;
    wake_device(device).await
}
