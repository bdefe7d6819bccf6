//! Interface addressing and routing policy
//!
//! Each [`Platform`] maps to a [`RouteRules`] implementation that turns the
//! configuration into an ordered list of commands. [`NetworkConfigurator`]
//! runs them best-effort: a failed command is logged and the remaining ones
//! are still attempted.
//!
//! Full-tunnel rules always pin the tunnel server (and the DNS server) to the
//! physical gateway. Without that host route the encapsulated traffic would be
//! routed back into the tunnel itself.
//!
//! Linux never replaces the default route (it installs the exclusion blocks
//! instead), so it has nothing to undo on shutdown. Darwin and Windows restore
//! their default routes.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::common::{CommandRunner, NetCommand, SystemRunner};
use crate::config::{Config, InterfaceAddrs};

use super::exclusion::exclusion_set;
use super::HostInfo;

/// Host operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
    Unsupported,
}

impl Platform {
    /// Platform this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::Darwin
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Unsupported
        }
    }

    /// Rule set for this platform
    pub fn rules(self) -> &'static dyn RouteRules {
        match self {
            Platform::Linux => &LinuxRules,
            Platform::Darwin => &DarwinRules,
            Platform::Windows => &WindowsRules,
            Platform::Unsupported => &UnsupportedRules,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Linux => write!(f, "linux"),
            Platform::Darwin => write!(f, "darwin"),
            Platform::Windows => write!(f, "windows"),
            Platform::Unsupported => write!(f, "{}", std::env::consts::OS),
        }
    }
}

/// Inputs for planning interface and route commands
#[derive(Debug, Clone, Copy)]
pub struct RouteContext<'a> {
    pub config: &'a Config,
    pub addrs: &'a InterfaceAddrs,
    pub tun_name: &'a str,
    pub host: &'a HostInfo,
}

impl<'a> RouteContext<'a> {
    /// Physical interface and server IP, when global-mode rules apply
    fn global_targets(&self) -> Option<(&'a str, IpAddr)> {
        if !self.config.is_global_client() {
            return None;
        }
        let physical = self.host.physical_iface.as_deref()?;
        let server_ip = self.host.server_ip?;
        Some((physical, server_ip))
    }
}

/// Platform-specific routing policy
pub trait RouteRules: Send + Sync {
    /// Commands that address the interface and install routes
    fn configure(&self, ctx: &RouteContext<'_>) -> Vec<NetCommand>;

    /// Commands that undo the global-mode changes
    fn reset(&self, config: &Config, host: &HostInfo) -> Vec<NetCommand>;

    /// Whether the host facts needed for global-mode routes are known
    fn global_ready(&self, ctx: &RouteContext<'_>) -> bool {
        ctx.global_targets().is_some()
    }
}

fn ip(args: &[&str]) -> NetCommand {
    NetCommand::new("ip", args.iter().copied())
}

fn route(args: &[&str]) -> NetCommand {
    NetCommand::new("route", args.iter().copied())
}

fn cmd_route(args: &[&str]) -> NetCommand {
    NetCommand::new("cmd", ["/C", "route"].iter().chain(args.iter()).copied())
}

/// Linux: iproute2, exclusion blocks through the tunnel device
pub struct LinuxRules;

impl RouteRules for LinuxRules {
    fn configure(&self, ctx: &RouteContext<'_>) -> Vec<NetCommand> {
        let dev = ctx.tun_name;
        let mtu = ctx.config.mtu.to_string();
        let mut cmds = vec![
            ip(&["link", "set", "dev", dev, "mtu", &mtu]),
            ip(&["addr", "add", &ctx.config.cidr, "dev", dev]),
            ip(&["link", "set", "dev", dev, "up"]),
        ];

        let Some((physical, server_ip)) = ctx.global_targets() else {
            return cmds;
        };

        if let Some(gateway) = ctx.config.local_gateway {
            let gateway = gateway.to_string();
            for block in exclusion_set() {
                cmds.push(ip(&["route", "add", &block.to_string(), "dev", dev]));
            }
            if let IpAddr::V4(server) = server_ip {
                let host_route = format!("{}/32", server);
                cmds.push(ip(&["route", "add", &host_route, "via", &gateway, "dev", physical]));
            }
        }

        match dns_gateway(ctx.config) {
            Some((dns, gateway)) => {
                let host_route = host_prefix(dns);
                cmds.push(ip(&["route", "add", &host_route, "via", &gateway, "dev", physical]));
            }
            None => debug!("no DNS bypass route for {:?}", ctx.config.dns_ip),
        }

        cmds
    }

    fn reset(&self, _config: &Config, _host: &HostInfo) -> Vec<NetCommand> {
        Vec::new()
    }
}

/// Darwin: ifconfig addressing, default route split into two /1 halves
pub struct DarwinRules;

impl RouteRules for DarwinRules {
    fn configure(&self, ctx: &RouteContext<'_>) -> Vec<NetCommand> {
        let dev = ctx.tun_name;
        let peer = ctx.config.server_ip.to_string();
        let local = ctx.addrs.ipv4.ip().to_string();
        let local6 = ctx.addrs.ipv6.ip().to_string();
        let peer6 = ctx.config.server_ipv6.to_string();
        let mut cmds = vec![
            NetCommand::new("ifconfig", [dev, "inet", local.as_str(), peer.as_str(), "up"]),
            NetCommand::new(
                "ifconfig",
                [dev, "inet6", local6.as_str(), peer6.as_str(), "up"],
            ),
        ];

        let Some((_, server_ip)) = ctx.global_targets() else {
            return cmds;
        };

        if let Some(gateway) = ctx.config.local_gateway {
            let gateway = gateway.to_string();
            cmds.push(route(&["add", "default", &peer]));
            cmds.push(route(&["change", "default", &peer]));
            cmds.push(route(&["add", "0.0.0.0/1", "-interface", dev]));
            cmds.push(route(&["add", "128.0.0.0/1", "-interface", dev]));
            if let IpAddr::V4(server) = server_ip {
                cmds.push(route(&["add", &server.to_string(), &gateway]));
            }
        }

        match dns_gateway(ctx.config) {
            Some((IpAddr::V6(dns), gateway)) => {
                cmds.push(route(&["add", "-inet6", &dns.to_string(), &gateway]));
            }
            Some((dns, gateway)) => cmds.push(route(&["add", &dns.to_string(), &gateway])),
            None => debug!("no DNS bypass route for {:?}", ctx.config.dns_ip),
        }

        cmds
    }

    fn reset(&self, config: &Config, _host: &HostInfo) -> Vec<NetCommand> {
        if !config.is_global_client() {
            return Vec::new();
        }
        let mut cmds = Vec::new();
        if let Some(gateway) = config.local_gateway {
            let gateway = gateway.to_string();
            cmds.push(route(&["add", "default", &gateway]));
            cmds.push(route(&["change", "default", &gateway]));
        }
        if let Some(gateway) = config.local_gateway_v6 {
            let gateway = gateway.to_string();
            cmds.push(route(&["add", "-inet6", "default", &gateway]));
            cmds.push(route(&["change", "-inet6", "default", &gateway]));
        }
        cmds
    }
}

/// Windows: IPv4 assigned at creation, default route swapped by metric
pub struct WindowsRules;

impl RouteRules for WindowsRules {
    fn configure(&self, ctx: &RouteContext<'_>) -> Vec<NetCommand> {
        let mut cmds = vec![NetCommand::new(
            "netsh",
            [
                "interface",
                "ipv6",
                "add",
                "address",
                ctx.tun_name,
                ctx.config.cidr_v6.as_str(),
            ],
        )];

        let Some(server_ip) = ctx.host.server_ip.filter(|_| self.global_ready(ctx)) else {
            return cmds;
        };

        if let Some(gateway) = ctx.config.local_gateway {
            let gateway = gateway.to_string();
            let peer = ctx.config.server_ip.to_string();
            cmds.push(cmd_route(&["delete", "0.0.0.0", "mask", "0.0.0.0"]));
            cmds.push(cmd_route(&[
                "add", "0.0.0.0", "mask", "0.0.0.0", &peer, "metric", "6",
            ]));
            if let IpAddr::V4(server) = server_ip {
                let host_route = format!("{}/32", server);
                cmds.push(cmd_route(&["add", &host_route, &gateway, "metric", "5"]));
            }
        }

        match dns_gateway(ctx.config) {
            Some((dns @ IpAddr::V6(_), gateway)) => {
                cmds.push(cmd_route(&["add", &host_prefix(dns), &gateway, "metric", "5"]));
            }
            Some((dns, gateway)) => {
                cmds.push(cmd_route(&["add", &dns.to_string(), &gateway, "metric", "5"]));
            }
            None => debug!("no DNS bypass route for {:?}", ctx.config.dns_ip),
        }

        cmds
    }

    /// route.exe needs no interface name, only the resolved server
    fn global_ready(&self, ctx: &RouteContext<'_>) -> bool {
        ctx.config.is_global_client() && ctx.host.server_ip.is_some()
    }

    fn reset(&self, config: &Config, host: &HostInfo) -> Vec<NetCommand> {
        if !config.is_global_client() || host.server_ip.is_none() {
            return Vec::new();
        }
        let mut cmds = Vec::new();
        if let Some(gateway) = config.local_gateway {
            let gateway = gateway.to_string();
            cmds.push(cmd_route(&["delete", "0.0.0.0", "mask", "0.0.0.0"]));
            cmds.push(cmd_route(&[
                "add", "0.0.0.0", "mask", "0.0.0.0", &gateway, "metric", "6",
            ]));
        }
        if let Some(gateway) = config.local_gateway_v6 {
            let gateway = gateway.to_string();
            cmds.push(cmd_route(&["-6", "delete", "::/0"]));
            cmds.push(cmd_route(&["-6", "add", "::/0", &gateway, "metric", "6"]));
        }
        cmds
    }
}

/// Platforms without a rule set
pub struct UnsupportedRules;

impl RouteRules for UnsupportedRules {
    fn configure(&self, _ctx: &RouteContext<'_>) -> Vec<NetCommand> {
        Vec::new()
    }

    fn reset(&self, _config: &Config, _host: &HostInfo) -> Vec<NetCommand> {
        Vec::new()
    }
}

/// DNS server and the physical gateway of the same family
fn dns_gateway(config: &Config) -> Option<(IpAddr, String)> {
    match config.dns_ip? {
        dns @ IpAddr::V6(_) => config.local_gateway_v6.map(|gw| (dns, gw.to_string())),
        dns @ IpAddr::V4(_) => config.local_gateway.map(|gw| (dns, gw.to_string())),
    }
}

fn host_prefix(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => format!("{}/32", v4),
        IpAddr::V6(v6) => format!("{}/128", v6),
    }
}

/// Outcome of a configuration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteReport {
    pub issued: usize,
    pub failed: usize,
}

/// Applies a platform's rules through a command runner
pub struct NetworkConfigurator {
    platform: Platform,
    runner: Arc<dyn CommandRunner>,
}

impl NetworkConfigurator {
    pub fn new(platform: Platform, runner: Arc<dyn CommandRunner>) -> Self {
        Self { platform, runner }
    }

    /// Current platform, real commands
    pub fn for_host() -> Self {
        Self::new(Platform::current(), Arc::new(SystemRunner))
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Address the interface and install routes
    pub async fn configure(&self, ctx: &RouteContext<'_>) -> RouteReport {
        if self.platform == Platform::Unsupported {
            warn!("not support os {}", self.platform);
        } else if ctx.config.is_global_client() && !self.platform.rules().global_ready(ctx) {
            warn!(
                "global mode: physical interface {:?} / server ip {:?} unavailable",
                ctx.host.physical_iface, ctx.host.server_ip
            );
        }

        let report = self.run(self.platform.rules().configure(ctx)).await;
        info!(
            "interface configured {} ({} commands, {} failed)",
            ctx.tun_name, report.issued, report.failed
        );
        report
    }

    /// Undo global-mode routing
    pub async fn reset(&self, config: &Config, host: &HostInfo) -> RouteReport {
        let report = self.run(self.platform.rules().reset(config, host)).await;
        if report.issued > 0 {
            info!("routes reset ({} commands, {} failed)", report.issued, report.failed);
        }
        report
    }

    async fn run(&self, cmds: Vec<NetCommand>) -> RouteReport {
        let mut report = RouteReport::default();
        for cmd in &cmds {
            report.issued += 1;
            if self.runner.exec(cmd).await.is_err() {
                report.failed += 1;
            }
        }
        report
    }
}
