//! WebSocket session implementation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tokio_tungstenite::{
    client_async_with_config,
    tungstenite::{
        handshake::client::{generate_key, Request},
        protocol::{Message as WsMessage, WebSocketConfig as TungsteniteConfig},
    },
    WebSocketStream,
};
use tracing::{debug, trace};

use crate::common::{Address, Result, Stream};
use crate::config::{Config, Protocol};
use crate::error::Error;

use super::{Connection, Dialer, Message, SharedConnection, TlsSettings};

/// Upper bound for TCP connect + TLS + WebSocket handshake
const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `close()` waits for the close frame to go out
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

type WsStream = WebSocketStream<Stream>;

fn ws_config() -> TungsteniteConfig {
    TungsteniteConfig {
        max_message_size: Some(1 << 20),
        max_frame_size: Some(1 << 20),
        ..Default::default()
    }
}

/// Dials `ws://` or `wss://` tunnel endpoints
pub struct WebSocketDialer {
    server: Address,
    path: String,
    key: String,
    tls: Option<TlsSettings>,
}

impl WebSocketDialer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let server = Address::parse(&config.server_addr)?;
        let tls = match config.protocol {
            Protocol::Ws => None,
            Protocol::Wss => Some(TlsSettings {
                server_name: config.tls_sni.clone().unwrap_or_else(|| server.host()),
                allow_insecure: config.tls_insecure_skip_verify,
            }),
        };
        Ok(Self {
            server,
            path: config.websocket_path.clone(),
            key: config.key.clone(),
            tls,
        })
    }

    /// Handshake URL
    pub fn url(&self) -> String {
        let scheme = if self.tls.is_some() {
            Protocol::Wss.scheme()
        } else {
            Protocol::Ws.scheme()
        };
        format!("{}://{}{}", scheme, self.server, self.path)
    }

    fn build_request(&self) -> Result<Request> {
        let mut request = Request::builder()
            .uri(self.url())
            .header("Host", self.server.to_string())
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Key", generate_key())
            .header("User-Agent", USER_AGENT);

        if !self.key.is_empty() {
            request = request.header("key", self.key.as_str());
        }

        request
            .body(())
            .map_err(|e| Error::Protocol(format!("Failed to build WebSocket request: {}", e)))
    }

    async fn connect(&self) -> Result<WebSocketConnection> {
        let tcp = TcpStream::connect(self.server.to_string()).await?;
        // Disable Nagle's algorithm for lower latency
        tcp.set_nodelay(true)?;

        let mut stream: Stream = Box::new(tcp);
        if let Some(tls) = &self.tls {
            stream = tls.wrap_client(stream).await?;
        }

        let request = self.build_request()?;
        let (ws_stream, _response) = client_async_with_config(request, stream, Some(ws_config()))
            .await
            .map_err(|e| Error::Protocol(format!("WebSocket handshake failed: {}", e)))?;

        Ok(WebSocketConnection::new(ws_stream))
    }
}

#[async_trait]
impl Dialer for WebSocketDialer {
    async fn dial(&self) -> Result<SharedConnection> {
        debug!("WebSocket: dialing {}", self.url());
        let conn = tokio::time::timeout(DIAL_TIMEOUT, self.connect())
            .await
            .map_err(|_| Error::Timeout)??;
        debug!("WebSocket: connected to {}", self.server);
        Ok(Arc::new(conn))
    }
}

/// Established WebSocket connection
///
/// Read and write halves are locked independently. Closing flips a watch
/// flag that wakes any pending `read_message()`.
pub struct WebSocketConnection {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
    stream: Mutex<SplitStream<WsStream>>,
    write_deadline: parking_lot::Mutex<Option<Instant>>,
    closed: watch::Sender<bool>,
}

impl WebSocketConnection {
    fn new(inner: WsStream) -> Self {
        let (sink, stream) = inner.split();
        let (closed, _) = watch::channel(false);
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            write_deadline: parking_lot::Mutex::new(None),
            closed,
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn send(&self, msg: WsMessage) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let deadline = *self.write_deadline.lock();
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(msg)
                .await
                .map_err(|e| Error::Transport(format!("WebSocket write failed: {}", e)))
        };

        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, write)
                .await
                .map_err(|_| Error::Timeout)?,
            None => write.await,
        }
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn read_message(&self) -> Result<Message> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(Error::ConnectionClosed);
        }

        let mut stream = self.stream.lock().await;
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = closed.changed() => return Err(Error::ConnectionClosed),
            };

            match next {
                Some(Ok(WsMessage::Binary(data))) => return Ok(Message::Binary(data)),
                Some(Ok(WsMessage::Text(text))) => return Ok(Message::Text(text.into_bytes())),
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {
                    trace!("WebSocket received control frame");
                }
                Some(Ok(WsMessage::Frame(_))) => {}
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!("WebSocket received close frame: {:?}", frame);
                    return Err(Error::ConnectionClosed);
                }
                Some(Err(e)) => {
                    return Err(Error::Transport(format!("WebSocket read failed: {}", e)));
                }
                None => return Err(Error::ConnectionClosed),
            }
        }
    }

    async fn write_text(&self, payload: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(payload).into_owned();
        self.send(WsMessage::Text(text)).await
    }

    async fn write_binary(&self, payload: &[u8]) -> Result<()> {
        self.send(WsMessage::Binary(payload.to_vec())).await
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) {
        *self.write_deadline.lock() = deadline;
    }

    async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        let close = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, close).await {
            Ok(Ok(())) => debug!("WebSocket closed"),
            Ok(Err(e)) => debug!("WebSocket close error: {}", e),
            Err(_) => debug!("WebSocket close timed out"),
        }
    }
}
