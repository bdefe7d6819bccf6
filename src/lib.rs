//! wstun - WebSocket tunnel client
//!
//! # Architecture
//!
//! ```text
//! TUN interface
//! → Forwarder (mask / compress)
//! → Registry ("current connection" slot)
//! → Session (WebSocket over TCP or TLS)
//! → tunnel server
//! ```
//!
//! The session runner is the only component that creates, publishes and
//! closes connections. The outbound forwarder only looks them up.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── common/          # Address, Registry, OS command execution
//! ├── codec/           # XOR mask, snappy, packet pipeline
//! ├── tun/             # Interface creation, exclusion set, route planning
//! ├── session/         # Connection/Dialer traits, WebSocket + TLS
//! ├── client/          # Forwarders and the reconnect loop
//! └── app/             # Metrics and the /metrics endpoint
//! ```

// Core types
pub mod common;
pub mod error;

// Layers
pub mod codec;
pub mod tun;
pub mod session;
pub mod client;
pub mod app;

// Supporting modules
pub mod config;

// Re-exports for convenience
pub use common::{Address, Registry, Stream};
pub use config::Config;
pub use error::{Error, Result};

pub use client::{Client, Forwarder};
pub use codec::Pipeline;
pub use session::{Connection, Dialer, WebSocketDialer};
pub use tun::{NetworkConfigurator, TunDevice};
