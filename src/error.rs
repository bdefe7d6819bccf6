//! Error types for wstun

use thiserror::Error;

/// Main error type for wstun
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {field} CIDR: {value}")]
    InvalidCidr { field: &'static str, value: String },

    #[error("TUN device error: {0}")]
    Tun(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,

    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

impl Error {
    /// Deadline-style failures the keepalive loop tolerates.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

/// Result type alias for wstun
pub type Result<T> = std::result::Result<T, Error>;
