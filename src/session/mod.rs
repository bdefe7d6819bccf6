//! Session Layer
//!
//! Responsibilities:
//! - Dial the tunnel server and complete the handshake
//! - Exchange whole application messages (text or binary) over the stream
//! - Bound writes with a deadline, close idempotently
//!
//! A [`Connection`] is owned by the session runner. Forwarders hold shared
//! references for reading and writing but never close it: `close()` belongs
//! to the runner alone, and a reader blocked in `read_message()` returns an
//! error once that happens.

mod tls;
mod websocket;

pub use tls::TlsSettings;
pub use websocket::{WebSocketConnection, WebSocketDialer};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::common::Result;

/// One application message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Liveness and control text
    Text(Vec<u8>),
    /// One encoded IP packet
    Binary(Vec<u8>),
}

/// Duplex message connection to the tunnel server
#[async_trait]
pub trait Connection: Send + Sync {
    /// Read the next text or binary message
    async fn read_message(&self) -> Result<Message>;

    /// Send a text message
    async fn write_text(&self, payload: &[u8]) -> Result<()>;

    /// Send a binary message
    async fn write_binary(&self, payload: &[u8]) -> Result<()>;

    /// Deadline for subsequent writes; `None` disables it
    fn set_write_deadline(&self, deadline: Option<Instant>);

    /// Close the connection. Safe to call more than once.
    async fn close(&self);
}

/// Shared handle to the live connection
pub type SharedConnection = Arc<dyn Connection>;

/// Establishes connections to the tunnel server
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self) -> Result<SharedConnection>;
}
