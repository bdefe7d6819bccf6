//! Server endpoint address

use std::net::{IpAddr, SocketAddr};

use crate::error::{Error, Result};

/// Endpoint address: a literal socket address or a host name with port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// IP socket address (IP + port)
    Socket(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl Address {
    /// Parse `host:port`, `ip:port` or `[ipv6]:port`
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(Address::Socket(addr));
        }

        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::Config(format!("Missing port in address: {}", s)))?;
        let port: u16 = port
            .parse()
            .map_err(|_| Error::Config(format!("Invalid port in address: {}", s)))?;
        if host.is_empty() {
            return Err(Error::Config(format!("Missing host in address: {}", s)));
        }
        Ok(Address::Domain(host.to_string(), port))
    }

    /// Get the port
    pub fn port(&self) -> u16 {
        match self {
            Address::Socket(addr) => addr.port(),
            Address::Domain(_, port) => *port,
        }
    }

    /// Get the host part as string
    pub fn host(&self) -> String {
        match self {
            Address::Socket(addr) => addr.ip().to_string(),
            Address::Domain(domain, _) => domain.clone(),
        }
    }

    /// Literal IP, if the address carries one
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Address::Socket(addr) => Some(addr.ip()),
            Address::Domain(_, _) => None,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Socket(addr) => write!(f, "{}", addr),
            Address::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Address::Socket(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_socket() {
        let addr = Address::parse("203.0.113.5:443").unwrap();
        assert_eq!(addr.ip(), Some("203.0.113.5".parse().unwrap()));
        assert_eq!(addr.port(), 443);

        let addr = Address::parse("[2001:db8::1]:8443").unwrap();
        assert_eq!(addr.host(), "2001:db8::1");
    }

    #[test]
    fn test_parse_domain() {
        let addr = Address::parse("vpn.example.com:3001").unwrap();
        assert_eq!(addr, Address::Domain("vpn.example.com".into(), 3001));
        assert_eq!(addr.to_string(), "vpn.example.com:3001");
        assert_eq!(addr.ip(), None);
    }

    #[test]
    fn test_parse_rejects_missing_port() {
        assert!(Address::parse("vpn.example.com").is_err());
        assert!(Address::parse("vpn.example.com:http").is_err());
        assert!(Address::parse(":80").is_err());
    }
}
