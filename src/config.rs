//! Configuration loading and validation.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result, ValidationError};

/// Highest usable 802.1Q VLAN identifier (4095 is reserved).
const MAX_VLAN_ID: u16 = 4094;

/// Main configuration for the relay.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Interface on which tagged mDNS traffic is captured and re-injected.
    pub interface: String,

    /// VLAN the target devices (e.g. Chromecasts) live on.
    pub target_vlan: u16,

    /// VLAN the clients live on.
    pub client_vlan: u16,

    /// Source address written into relayed queries. Must sit inside the
    /// target devices' subnet, since they ignore off-subnet queries.
    #[serde(deserialize_with = "deserialize_ipv4")]
    pub spoof_source_ip: Ipv4Addr,

    /// Capacity of the queue between the decode task and the forwarding loop.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

const fn default_channel_capacity() -> usize {
    100
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9105))
}

fn deserialize_ipv4<'de, D>(deserializer: D) -> std::result::Result<Ipv4Addr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse()
        .map_err(|_| serde::de::Error::custom(format!("invalid IPv4 address: {s:?}")))
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate().map_err(ConfigError::from)?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.interface.trim().is_empty() {
            return Err(ValidationError::EmptyInterface);
        }

        for (field, value) in [
            ("target_vlan", self.target_vlan),
            ("client_vlan", self.client_vlan),
        ] {
            if value == 0 || value > MAX_VLAN_ID {
                return Err(ValidationError::VlanOutOfRange { field, value });
            }
        }

        if self.channel_capacity == 0 {
            return Err(ValidationError::ZeroChannelCapacity);
        }

        Ok(())
    }
}
