//! Stream abstraction
//!
//! Plain TCP and TLS connections are both carried as a boxed [`Stream`]
//! before the WebSocket handshake runs on top.

use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream underneath the WebSocket framing
pub type Stream = Box<dyn AsyncReadWrite + Unpin + Send>;

/// Combined trait for async read + write
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}

impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
