//! Configuration management

use crate::device::DeviceConfig;
use crate::key::Key;
use crate::obfuscation::ObfuscationParams;
use crate::peer::PeerIdentity;
use crate::resolver::{self, Upstream};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Local interface settings
    pub interface: InterfaceConfig,
    /// Remote peer settings
    pub peer: PeerConfig,
    /// Endpoint resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Obfuscation parameters
    #[serde(default)]
    pub obfuscation: ObfuscationParams,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), crate::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| crate::Error::Config(format!("Failed to write config: {}", e)))
    }

    /// Device-side configuration with decoded keys
    pub fn device(&self) -> Result<DeviceConfig, crate::Error> {
        Ok(DeviceConfig {
            private_key: Key::from_base64(&self.interface.private_key)?,
            listen_port: match self.interface.listen_port {
                0 => None,
                port => Some(port),
            },
            obfuscation: self.obfuscation.clone(),
        })
    }

    /// Peer identity with decoded keys
    pub fn identity(&self) -> Result<PeerIdentity, crate::Error> {
        let preshared_key = match self.peer.preshared_key.as_str() {
            "" => None,
            psk => Some(Key::from_base64(psk)?),
        };
        Ok(PeerIdentity {
            public_key: Key::from_base64(&self.peer.public_key)?,
            preshared_key,
        })
    }

    /// Peer endpoint split into host and port
    pub fn peer_endpoint(&self) -> Result<(String, u16), crate::Error> {
        let (host, port) = resolver::split_host_port(&self.peer.endpoint).map_err(|reason| {
            crate::Error::Config(format!(
                "Invalid peer endpoint '{}': {}",
                self.peer.endpoint, reason
            ))
        })?;
        let port = port.ok_or_else(|| {
            crate::Error::Config(format!(
                "Invalid peer endpoint '{}': missing port",
                self.peer.endpoint
            ))
        })?;
        Ok((host, port))
    }

    /// Keepalive interval, unset when zero
    pub fn keepalive(&self) -> Option<u64> {
        match self.peer.keepalive_interval {
            0 => None,
            secs => Some(secs),
        }
    }

    /// Parsed resolver upstream selector
    pub fn upstream(&self) -> Result<Upstream, crate::Error> {
        if self.resolver.dns.is_empty() {
            return Ok(Upstream::default());
        }
        Ok(Upstream::parse(&self.resolver.dns)?)
    }

    /// Re-resolution interval; zero disables reconciliation
    pub fn resolve_interval(&self) -> Duration {
        Duration::from_secs(self.resolver.interval)
    }
}

/// Local interface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Private key (base64)
    pub private_key: String,
    /// Listen port (0 lets the device choose)
    #[serde(default)]
    pub listen_port: u16,
}

/// Remote peer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Peer endpoint as host:port
    pub endpoint: String,
    /// Peer public key (base64)
    pub public_key: String,
    /// Preshared key (base64, optional)
    #[serde(default)]
    pub preshared_key: String,
    /// Keepalive interval in seconds (0 disables)
    #[serde(default)]
    pub keepalive_interval: u64,
}

/// Endpoint resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolver selector as protocol://host:port; empty uses the system path
    pub dns: String,
    /// Re-resolution interval in seconds (0 disables)
    pub interval: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            dns: String::new(),
            interval: 60,
        }
    }
}
