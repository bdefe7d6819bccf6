//! Tunnel session runner
//!
//! Drives `Idle → Dialing → Connected → Draining → Idle` forever:
//! dial, publish the connection, start its inbound forwarder, keep it alive
//! until a non-timeout write error, then close and unpublish it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::common::registry::{CONNECTION_KEY, CONNECTION_TTL};
use crate::error::Error;
use crate::session::{Dialer, SharedConnection};

use super::forwarder::{report, Forwarder};

/// Liveness message sent on an idle connection
pub const KEEPALIVE_MESSAGE: &[u8] = b"ping";

/// Session timing knobs
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Pause after a failed dial
    pub retry_delay: Duration,
    /// Period between liveness messages
    pub keepalive_interval: Duration,
    /// Write deadline for each liveness message
    pub keepalive_deadline: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(3),
            keepalive_interval: Duration::from_secs(3),
            keepalive_deadline: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Dialing,
    Connected,
    Draining,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Dialing => "dialing",
            SessionState::Connected => "connected",
            SessionState::Draining => "draining",
        };
        f.write_str(name)
    }
}

/// Tunnel client: owns the reconnect loop and the forwarders
pub struct Client {
    dialer: Arc<dyn Dialer>,
    forwarder: Forwarder,
    timing: SessionTiming,
    state: watch::Sender<SessionState>,
}

impl Client {
    pub fn new(dialer: Arc<dyn Dialer>, forwarder: Forwarder) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            dialer,
            forwarder,
            timing: SessionTiming::default(),
            state,
        }
    }

    pub fn with_timing(mut self, timing: SessionTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        debug!("Session: {} -> {}", prev, next);
    }

    /// Run until the process exits
    ///
    /// The outbound forwarder is started here, once. It outlives every
    /// session because it resolves the connection from the registry.
    pub async fn run(&self) {
        tokio::spawn(self.forwarder.clone().tun_to_ws());

        loop {
            self.transition(SessionState::Dialing);
            self.forwarder.stats.dial_started();

            match self.dialer.dial().await {
                Ok(conn) => {
                    self.run_session(conn).await;
                }
                Err(e) => {
                    self.forwarder.stats.dial_failed();
                    warn!(
                        "Dial failed: {}, retrying in {:?}",
                        e, self.timing.retry_delay
                    );
                    self.transition(SessionState::Idle);
                    tokio::time::sleep(self.timing.retry_delay).await;
                }
            }
        }
    }

    /// Serve one established connection until its keepalive fails
    pub async fn run_session(&self, conn: SharedConnection) {
        let registry = &self.forwarder.registry;
        registry.set(CONNECTION_KEY, conn.clone(), CONNECTION_TTL);
        self.forwarder.stats.session_started();
        self.transition(SessionState::Connected);
        info!("Tunnel connected");

        tokio::spawn(self.forwarder.clone().ws_to_tun(conn.clone()));

        let err = self.keepalive(&conn).await;
        info!("Tunnel session ended: {}", err);

        self.transition(SessionState::Draining);
        conn.close().await;
        registry.delete(CONNECTION_KEY);
        self.transition(SessionState::Idle);
    }

    /// Send liveness messages until a write fails with something other
    /// than a deadline, and return that error
    async fn keepalive(&self, conn: &SharedConnection) -> Error {
        let period = self.timing.keepalive_interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            conn.set_write_deadline(Some(Instant::now() + self.timing.keepalive_deadline));
            match conn.write_text(KEEPALIVE_MESSAGE).await {
                Ok(()) => {}
                Err(e) if e.is_timeout() => {
                    report(self.forwarder.verbose, "Keepalive timed out", &e);
                }
                Err(e) => return e,
            }
        }
    }
}
