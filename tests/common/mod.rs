//! In-memory stand-ins for the interface, the transport and the OS

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use wstun::app::TrafficStats;
use wstun::client::Forwarder;
use wstun::codec::Pipeline;
use wstun::common::{CommandRunner, NetCommand, Registry};
use wstun::session::{Connection, Dialer, Message, SharedConnection};
use wstun::tun::TunDevice;
use wstun::{Error, Result};

// === Interface ===

/// TUN device fed through channels
pub struct FakeTun {
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    written: mpsc::UnboundedSender<Vec<u8>>,
}

/// Test side of a [`FakeTun`]
pub struct TunHandle {
    /// Packets the "kernel" hands to the client; drop to fail reads
    pub inject: mpsc::UnboundedSender<Vec<u8>>,
    /// Packets the client wrote to the interface
    pub written: mpsc::UnboundedReceiver<Vec<u8>>,
}

pub fn fake_tun() -> (Arc<FakeTun>, TunHandle) {
    let (inject, incoming) = mpsc::unbounded_channel();
    let (written_tx, written) = mpsc::unbounded_channel();
    let tun = Arc::new(FakeTun {
        incoming: tokio::sync::Mutex::new(incoming),
        written: written_tx,
    });
    (tun, TunHandle { inject, written })
}

#[async_trait]
impl TunDevice for FakeTun {
    fn name(&self) -> &str {
        "tun0"
    }

    async fn read_packet(&self, buf: &mut [u8]) -> Result<usize> {
        let packet = self
            .incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| Error::Tun("tun0 closed".into()))?;
        buf[..packet.len()].copy_from_slice(&packet);
        Ok(packet.len())
    }

    async fn write_packet(&self, packet: &[u8]) -> Result<()> {
        self.written
            .send(packet.to_vec())
            .map_err(|_| Error::Tun("tun0 closed".into()))
    }
}

// === Transport ===

/// Scripted outcome of one keepalive write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Ok,
    Timeout,
    Fail,
}

pub struct FakeConnection {
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
    inject: mpsc::UnboundedSender<Message>,
    binary: Mutex<Vec<Vec<u8>>>,
    text_script: Mutex<VecDeque<WriteOutcome>>,
    text_default: WriteOutcome,
    texts: AtomicUsize,
    deadline: Mutex<Option<Instant>>,
    closed: watch::Sender<bool>,
}

impl FakeConnection {
    pub fn new() -> Arc<Self> {
        Self::scripted(Vec::new(), WriteOutcome::Ok)
    }

    /// Keepalive writes follow `script`, then `default`
    pub fn scripted(script: Vec<WriteOutcome>, default: WriteOutcome) -> Arc<Self> {
        let (inject, incoming) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            incoming: tokio::sync::Mutex::new(incoming),
            inject,
            binary: Mutex::new(Vec::new()),
            text_script: Mutex::new(script.into()),
            text_default: default,
            texts: AtomicUsize::new(0),
            deadline: Mutex::new(None),
            closed,
        })
    }

    /// Deliver a message as if the server sent it
    pub fn push(&self, message: Message) {
        let _ = self.inject.send(message);
    }

    pub fn sent_binary(&self) -> Vec<Vec<u8>> {
        self.binary.lock().clone()
    }

    pub fn texts_sent(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    pub fn last_deadline(&self) -> Option<Instant> {
        *self.deadline.lock()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn read_message(&self) -> Result<Message> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(Error::ConnectionClosed);
        }
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            message = incoming.recv() => message.ok_or(Error::ConnectionClosed),
            _ = closed.changed() => Err(Error::ConnectionClosed),
        }
    }

    async fn write_text(&self, _payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        self.texts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .text_script
            .lock()
            .pop_front()
            .unwrap_or(self.text_default);
        match outcome {
            WriteOutcome::Ok => Ok(()),
            WriteOutcome::Timeout => Err(Error::Timeout),
            WriteOutcome::Fail => Err(Error::Transport("broken pipe".into())),
        }
    }

    async fn write_binary(&self, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        self.binary.lock().push(payload.to_vec());
        Ok(())
    }

    fn set_write_deadline(&self, deadline: Option<Instant>) {
        *self.deadline.lock() = deadline;
    }

    async fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Fails a fixed number of times, then hands out queued connections
pub struct FakeDialer {
    failures_left: AtomicUsize,
    attempts: Mutex<Vec<Instant>>,
    connections: Mutex<VecDeque<Arc<FakeConnection>>>,
}

impl FakeDialer {
    pub fn new(failures: usize, connections: Vec<Arc<FakeConnection>>) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicUsize::new(failures),
            attempts: Mutex::new(Vec::new()),
            connections: Mutex::new(connections.into()),
        })
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Dialer for FakeDialer {
    async fn dial(&self) -> Result<SharedConnection> {
        self.attempts.lock().push(Instant::now());
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Transport("connection refused".into()));
        }
        let conn = self
            .connections
            .lock()
            .pop_front()
            .unwrap_or_else(FakeConnection::new);
        Ok(conn)
    }
}

pub fn forwarder(device: Arc<FakeTun>, pipeline: Pipeline) -> Forwarder {
    Forwarder {
        device,
        registry: Arc::new(Registry::new()),
        pipeline,
        stats: TrafficStats::new(),
        buffer_size: 64 * 1024,
        verbose: true,
    }
}

// === OS commands ===

/// Records every command, failing those that match `fail_when`
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<NetCommand>>,
    fail_prefixes: Vec<Vec<String>>,
}

impl RecordingRunner {
    /// Fail any command whose arguments start with one of `prefixes`
    pub fn failing(prefixes: &[&[&str]]) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail_prefixes: prefixes
                .iter()
                .map(|p| p.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.commands.lock().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn exec(&self, cmd: &NetCommand) -> Result<()> {
        self.commands.lock().push(cmd.clone());
        if self
            .fail_prefixes
            .iter()
            .any(|prefix| cmd.args.starts_with(prefix))
        {
            return Err(Error::Command(cmd.to_string()));
        }
        Ok(())
    }
}

/// BSD `route` semantics for default routes: `add` fails when one
/// exists, `change` fails when none does
pub struct DarwinRouteTable {
    defaults: Mutex<HashMap<&'static str, String>>,
}

impl DarwinRouteTable {
    pub fn with_defaults(v4: &str, v6: &str) -> Self {
        let mut defaults = HashMap::new();
        defaults.insert("inet", v4.to_string());
        defaults.insert("inet6", v6.to_string());
        Self {
            defaults: Mutex::new(defaults),
        }
    }

    pub fn default_route(&self, family: &str) -> Option<String> {
        self.defaults.lock().get(family).cloned()
    }
}

#[async_trait]
impl CommandRunner for DarwinRouteTable {
    async fn exec(&self, cmd: &NetCommand) -> Result<()> {
        if cmd.program != "route" {
            return Ok(());
        }
        let args: Vec<&str> = cmd.args.iter().map(String::as_str).collect();
        let (verb, family, gateway) = match args.as_slice() {
            [verb, "default", gw] => (*verb, "inet", *gw),
            [verb, "-inet6", "default", gw] => (*verb, "inet6", *gw),
            _ => return Ok(()),
        };

        let mut defaults = self.defaults.lock();
        match verb {
            "add" if defaults.contains_key(family) => {
                Err(Error::Command(format!("{}: File exists", cmd)))
            }
            "change" if !defaults.contains_key(family) => {
                Err(Error::Command(format!("{}: not in table", cmd)))
            }
            "add" | "change" => {
                defaults.insert(family, gateway.to_string());
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
