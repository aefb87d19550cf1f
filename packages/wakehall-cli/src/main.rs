//! wakehall CLI - wake and discover LAN devices from a shell
//!
//! The same discovery/wake core the web dashboard uses, without the server:
//! - List configured devices with their current liveness
//! - Wake a device by name, registry id, or raw hardware address
//! - Sweep the local subnets (or a range) for devices the ARP cache knows

use std::net::IpAddr;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use wakehall_core::{FindOptions, LocalScanner, ScanReport, WakeOptions, config, registry, wol};

#[derive(Parser)]
#[command(name = "wakehall")]
#[command(version)]
#[command(about = "Wake-on-LAN and local device discovery")]
#[command(long_about = "
wakehall lists the devices configured in ~/.config/wakehall/config.toml,
reports whether each is awake, and wakes sleeping ones with a Wake-on-LAN
magic packet.

Quick start:
  1. Write a config:      wakehall config
  2. See your devices:    wakehall devices
  3. Wake one:            wakehall wake tower
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured devices with their current liveness
    #[command(alias = "list")]
    Devices,

    /// Wake a device
    Wake {
        /// Device name, registry id, or raw hardware address
        device: String,

        /// Broadcast address for the magic packet
        #[arg(short, long, default_value = "255.255.255.255")]
        broadcast: IpAddr,

        /// UDP port for the magic packet
        #[arg(short, long, default_value_t = wol::DEFAULT_WAKE_PORT)]
        port: u16,
    },

    /// Sweep the local network for devices in the ARP cache
    Scan {
        /// CIDR block, dash range, or single address; local subnets if omitted
        target: Option<String>,

        /// Skip hostname resolution in the ARP listing
        #[arg(short = 'n', long)]
        numeric: bool,
    },

    /// Show the configuration path and an example config
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("wakehall={log_level},wakehall_core={log_level}").into()
            }),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Devices => cmd_devices(&cli).await,
        Commands::Wake {
            ref device,
            broadcast,
            port,
        } => cmd_wake(&cli, device, broadcast, port).await,
        Commands::Scan { ref target, numeric } => cmd_scan(&cli, target.clone(), numeric).await,
        Commands::Config => cmd_config(&cli),
    }
}

async fn cmd_devices(cli: &Cli) -> Result<()> {
    let devices = config::load()?.registry()?;
    let awakable = registry::list_awakable(&devices).await?;

    match cli.format {
        OutputFormat::Text => {
            if awakable.is_empty() {
                println!("No devices configured. Run 'wakehall config' for an example.");
            }
            for device in &awakable {
                println!("{:>3}  {}", device.id, device.name_and_status());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&awakable)?);
        }
    }
    Ok(())
}

async fn cmd_wake(cli: &Cli, device: &str, broadcast: IpAddr, port: u16) -> Result<()> {
    let devices = config::load()?.registry()?;
    let options = WakeOptions {
        broadcast_address: broadcast,
        port,
    };

    // Display name first, then registry id, then a raw hardware address.
    let target = devices
        .find_by_name(device)
        .map(|(_, found)| found.clone())
        .or_else(|| {
            device
                .parse::<usize>()
                .ok()
                .and_then(|id| devices.get(id).cloned())
        });

    let (label, sent) = match target {
        Some(found) => {
            let sent = registry::wake_device_with(&found, move |mac| {
                let options = options.clone();
                async move { wol::wake(&mac, options).await }
            })
            .await?;
            (found.name.clone(), sent)
        }
        None if device.parse::<wakehall_core::MacAddress>().is_ok() => {
            (device.to_string(), wol::wake(device, options).await?)
        }
        None => bail!("unknown device: {device}"),
    };

    match cli.format {
        OutputFormat::Text => {
            if sent {
                println!("Magic packet sent to {label}.");
            } else {
                println!("Magic packet to {label} was truncated; the device may not wake.");
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "device": label, "sent": sent })
            );
        }
    }
    Ok(())
}

async fn cmd_scan(cli: &Cli, target: Option<String>, numeric: bool) -> Result<()> {
    let scanner = LocalScanner::new();
    tracing::debug!(
        "scanning {}",
        target.as_deref().filter(|t| !t.is_empty()).unwrap_or("local subnets")
    );
    let report = scanner
        .find(FindOptions {
            address: target.unwrap_or_default(),
            skip_name_resolution: numeric,
            arp_tool: None,
        })
        .await?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => match report {
            ScanReport::Sweep(devices) => {
                if devices.is_empty() {
                    println!("No devices found in the ARP table.");
                }
                for device in devices {
                    println!("{:<16} {:<18} {}", device.ip, device.mac, device.name);
                }
            }
            ScanReport::Single(Some(device)) => {
                println!("{:<16} {:<18} {}", device.ip, device.mac, device.name);
            }
            ScanReport::Single(None) => println!("No ARP entry for that address."),
        },
    }
    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let path = config::config_file_path().map(|path| path.display().to_string());

    match cli.format {
        OutputFormat::Text => {
            println!(
                "Config file: {}",
                path.as_deref().unwrap_or("(no config directory available)")
            );
            println!();
            println!("{}", config::example_config());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "configFile": path }));
        }
    }
    Ok(())
}
