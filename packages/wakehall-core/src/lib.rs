//! wakehall core library
//!
//! This crate provides the discovery/wake functionality shared by the
//! wakehall server and CLI:
//! - Neighbour table reading (`ip neigh show`)
//! - Single-shot ICMP liveness probes
//! - ARP-cache device sweeps with single-flight de-duplication
//! - Wake-on-LAN magic packet construction and UDP broadcast
//! - The configured-device registry and its awakability resolver
//!
//! # Example
//!
//! ```no_run
//! use wakehall_core::{config, registry};
//!
//! #[tokio::main]
//! async fn main() -> wakehall_core::Result<()> {
//!     let devices = config::load()?.registry()?;
//!
//!     // What can I wake, and is it already on?
//!     for device in registry::list_awakable(&devices).await? {
//!         println!("{}", device.name_and_status());
//!     }
//!
//!     // Wake the first configured device.
//!     registry::wake_by_id(&devices, 0).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod localscan;
pub mod neighbour;
pub mod probe;
pub mod registry;
pub mod singleflight;
pub mod wol;

mod command;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use localscan::{FindOptions, LocalDevice, LocalScanner, ScanReport};
pub use neighbour::{Neighbour, NeighbourState};
pub use probe::PingResult;
pub use registry::{AwakableDevice, Device, DeviceRegistry, WakeDependency};
pub use wol::{MacAddress, WakeOptions};
