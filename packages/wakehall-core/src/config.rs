//! Configuration loading.
//!
//! Priority: explicit path in `WAKEHALL_CONFIG`, then
//! `~/.config/wakehall/config.toml`, then built-in defaults (empty
//! registry, port 3000). Malformed device entries fail the load loudly; a
//! dropped dependency block is worse than a refused startup.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::registry::{Device, DeviceRegistry};

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG_PATH: &str = "WAKEHALL_CONFIG";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BIND: &str = "0.0.0.0";

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl Config {
    /// Build the validated device registry from the configured list.
    pub fn registry(&self) -> Result<DeviceRegistry> {
        DeviceRegistry::new(self.devices.clone())
    }
}

/// Path of the config file the loader would use.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        let path = path.trim();
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .map(|dir| dir.join("wakehall").join("config.toml"))
}

/// Load configuration from an explicit file.
pub fn load_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
    let config: Config = toml::from_str(&content)
        .map_err(|err| Error::Config(format!("cannot parse {}: {err}", path.display())))?;

    tracing::debug!(
        "loaded {} device(s) from {}",
        config.devices.len(),
        path.display()
    );
    Ok(config)
}

/// Load configuration, falling back to defaults when no file exists.
pub fn load() -> Result<Config> {
    let Some(path) = config_file_path() else {
        tracing::debug!("no config directory available, using defaults");
        return Ok(Config::default());
    };

    if !path.exists() {
        tracing::debug!("no config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    load_file(&path)
}

/// Sample configuration, shown by the `config` subcommand.
pub fn example_config() -> String {
    r#"# wakehall configuration
# Place this file at ~/.config/wakehall/config.toml
# or point WAKEHALL_CONFIG at it.

[server]
bind_address = "0.0.0.0"
port = 3000

# One [[devices]] block per wakeable machine.
[[devices]]
mac = "11:22:33:44:55:66"
name = "tower"
desc = "Desktop in the office"
link = "https://tower.lan/"
staticIpAddress = "192.168.1.40"

# A device behind a smart plug: wake the plug first, then the device once
# it has had mains power for half a minute.
[[devices]]
mac = "22:33:44:55:66:77"
name = "nas"

[devices.require]
device = "33:44:55:66:77:88"
delay = 30
"#
    .to_string()
}
