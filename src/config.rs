//! Configuration module for wstun
//!
//! JSON configuration, immutable once the client starts.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use ipnetwork::{Ipv4Network, Ipv6Network};

use crate::common::Address;
use crate::error::{Error, Result};

/// Smallest MTU every IPv4 host must accept
const MIN_MTU: u16 = 576;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TUN device name (empty: platform default)
    pub device_name: String,

    /// Local tunnel IPv4 address with prefix, e.g. "172.16.0.10/24"
    pub cidr: String,

    /// Local tunnel IPv6 address with prefix
    pub cidr_v6: String,

    /// Tunnel peer (server side) IPv4 address
    pub server_ip: Ipv4Addr,

    /// Tunnel peer (server side) IPv6 address
    pub server_ipv6: Ipv6Addr,

    /// Remote endpoint, "host:port"
    pub server_addr: String,

    /// Physical IPv4 gateway, required for global mode routes
    pub local_gateway: Option<Ipv4Addr>,

    /// Physical IPv6 gateway
    pub local_gateway_v6: Option<Ipv6Addr>,

    /// DNS server kept off the tunnel in global mode
    pub dns_ip: Option<IpAddr>,

    /// Interface MTU
    pub mtu: u16,

    /// Interface read buffer size
    pub buffer_size: usize,

    /// Shared key sent with the handshake
    pub key: String,

    /// Transport protocol
    pub protocol: Protocol,

    /// WebSocket request path
    pub websocket_path: String,

    /// TLS server name (defaults to the server host)
    pub tls_sni: Option<String>,

    /// Skip certificate verification
    pub tls_insecure_skip_verify: bool,

    /// Server role (not supported by this client)
    pub server_mode: bool,

    /// Route all traffic through the tunnel
    pub global_mode: bool,

    /// Compress packets
    pub compress: bool,

    /// Obfuscate packets
    pub obfs: bool,

    /// Log per-packet errors
    pub verbose: bool,

    /// Listen address for the metrics endpoint (e.g., "127.0.0.1:9090")
    pub api_listen: Option<String>,
}

/// Transport protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ws,
    Wss,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Ws => "ws",
            Protocol::Wss => "wss",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            cidr: "172.16.0.10/24".to_string(),
            cidr_v6: "fced:9999::9999/64".to_string(),
            server_ip: Ipv4Addr::new(172, 16, 0, 1),
            server_ipv6: "fced:9999::1".parse().unwrap_or(Ipv6Addr::UNSPECIFIED),
            server_addr: "127.0.0.1:3001".to_string(),
            local_gateway: None,
            local_gateway_v6: None,
            dns_ip: Some(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
            mtu: 1500,
            buffer_size: 64 * 1024,
            key: String::new(),
            protocol: Protocol::Ws,
            websocket_path: "/freedom".to_string(),
            tls_sni: None,
            tls_insecure_skip_verify: false,
            server_mode: false,
            global_mode: false,
            compress: false,
            obfs: false,
            verbose: false,
            api_listen: None,
        }
    }
}

/// Parsed tunnel addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddrs {
    pub ipv4: Ipv4Network,
    pub ipv6: Ipv6Network,
}

impl InterfaceAddrs {
    pub fn from_config(config: &Config) -> Result<Self> {
        let ipv4 = config
            .cidr
            .parse::<Ipv4Network>()
            .map_err(|_| Error::InvalidCidr {
                field: "cidr",
                value: config.cidr.clone(),
            })?;
        let ipv6 = config
            .cidr_v6
            .parse::<Ipv6Network>()
            .map_err(|_| Error::InvalidCidr {
                field: "cidr_v6",
                value: config.cidr_v6.clone(),
            })?;
        Ok(Self { ipv4, ipv6 })
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Create a sample client configuration
    pub fn default_client() -> Self {
        Config {
            server_addr: "vpn.example.com:443".to_string(),
            local_gateway: Some(Ipv4Addr::new(192, 168, 1, 1)),
            key: "change-me".to_string(),
            protocol: Protocol::Wss,
            global_mode: true,
            compress: true,
            ..Default::default()
        }
    }

    /// Check the configuration without side effects and return the parsed addressing
    pub fn validate(&self) -> Result<InterfaceAddrs> {
        let addrs = InterfaceAddrs::from_config(self)?;

        if self.mtu < MIN_MTU {
            return Err(Error::Config(format!(
                "MTU {} is below the minimum of {}",
                self.mtu, MIN_MTU
            )));
        }
        if self.buffer_size < self.mtu as usize {
            return Err(Error::Config(format!(
                "buffer_size {} is smaller than MTU {}",
                self.buffer_size, self.mtu
            )));
        }
        Address::parse(&self.server_addr)?;
        if !self.websocket_path.starts_with('/') {
            return Err(Error::Config(format!(
                "websocket_path must start with '/': {}",
                self.websocket_path
            )));
        }

        Ok(addrs)
    }

    /// Client role with full-tunnel routing
    pub fn is_global_client(&self) -> bool {
        !self.server_mode && self.global_mode
    }
}
