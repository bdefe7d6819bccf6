//! Host network discovery
//!
//! Full-tunnel routing needs two facts about the host: which physical
//! interface currently carries the default route, and which IP the tunnel
//! server resolves to. Either may be missing, in which case the global-mode
//! rules are skipped.

use std::net::IpAddr;

use tracing::{debug, warn};

use crate::common::command::capture_stdout;
use crate::common::Address;

use super::Platform;

/// Discovered host facts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    /// Interface carrying the default route (e.g. "eth0", "en0")
    pub physical_iface: Option<String>,
    /// Resolved IP of the tunnel server
    pub server_ip: Option<IpAddr>,
}

impl HostInfo {
    /// Probe the running host
    pub async fn discover(platform: Platform, server_addr: &str) -> Self {
        let physical_iface = physical_interface(platform).await;
        let server_ip = lookup_server_ip(server_addr).await;
        debug!(
            "host: physical interface {:?}, server ip {:?}",
            physical_iface, server_ip
        );
        Self {
            physical_iface,
            server_ip,
        }
    }
}

/// Interface holding the default route
pub async fn physical_interface(platform: Platform) -> Option<String> {
    match platform {
        Platform::Linux => capture_stdout("ip", &["route", "show", "default"])
            .await
            .and_then(|out| parse_linux_default_route(&out)),
        Platform::Darwin => capture_stdout("route", &["-n", "get", "default"])
            .await
            .and_then(|out| parse_darwin_default_route(&out)),
        Platform::Windows | Platform::Unsupported => None,
    }
}

/// Resolve the server endpoint, preferring IPv4
pub async fn lookup_server_ip(server_addr: &str) -> Option<IpAddr> {
    let addr = match Address::parse(server_addr) {
        Ok(addr) => addr,
        Err(e) => {
            warn!("cannot parse server address {}: {}", server_addr, e);
            return None;
        }
    };
    if let Some(ip) = addr.ip() {
        return Some(ip);
    }

    match tokio::net::lookup_host((addr.host(), addr.port())).await {
        Ok(resolved) => {
            let ips: Vec<IpAddr> = resolved.map(|sa| sa.ip()).collect();
            ips.iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| ips.first())
                .copied()
        }
        Err(e) => {
            warn!("failed to resolve server address {}: {}", server_addr, e);
            None
        }
    }
}

/// `default via 192.168.1.1 dev eth0 proto dhcp metric 100` -> `eth0`
///
/// Routes already pointing at a tun device are skipped.
pub fn parse_linux_default_route(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("default") {
            return None;
        }
        let dev = fields.skip_while(|f| *f != "dev").nth(1)?;
        if dev.starts_with("tun") {
            return None;
        }
        Some(dev.to_string())
    })
}

/// `   interface: en0` line of `route -n get default`
pub fn parse_darwin_default_route(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        if key.trim() != "interface" {
            return None;
        }
        let value = value.trim();
        if value.is_empty() || value.starts_with("utun") {
            None
        } else {
            Some(value.to_string())
        }
    })
}
