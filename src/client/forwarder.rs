//! Packet forwarding between the TUN interface and the tunnel connection
//!
//! Outbound (interface → transport) runs once for the whole process and
//! resolves the live connection from the registry per packet. Inbound
//! (transport → interface) is bound to one connection and ends when a read
//! on that connection fails, which is how closing the connection stops it.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::app::TrafficStats;
use crate::codec::Pipeline;
use crate::common::registry::CONNECTION_KEY;
use crate::common::Registry;
use crate::error::Error;
use crate::session::{Message, SharedConnection};
use crate::tun::TunDevice;

/// Log a per-packet failure, loudly only when verbose
pub(crate) fn report(verbose: bool, context: &str, err: &Error) {
    if verbose {
        warn!("{}: {}", context, err);
    } else {
        trace!("{}: {}", context, err);
    }
}

/// Everything both forwarding directions share
#[derive(Clone)]
pub struct Forwarder {
    pub device: Arc<dyn TunDevice>,
    pub registry: Arc<Registry<SharedConnection>>,
    pub pipeline: Pipeline,
    pub stats: Arc<TrafficStats>,
    pub buffer_size: usize,
    pub verbose: bool,
}

impl Forwarder {
    /// Interface → transport. Returns only when the interface fails.
    pub async fn tun_to_ws(self) {
        let mut packet = vec![0u8; self.buffer_size];
        loop {
            let n = match self.device.read_packet(&mut packet).await {
                Ok(n) => n,
                Err(e) => {
                    warn!("Outbound: read from {} failed: {}", self.device.name(), e);
                    break;
                }
            };

            let Some(conn) = self.registry.get(CONNECTION_KEY) else {
                self.stats.record_dropped();
                trace!("Outbound: no live connection, dropped {} bytes", n);
                continue;
            };

            let payload = match self.pipeline.encode(&packet[..n]) {
                Ok(payload) => payload,
                Err(e) => {
                    report(self.verbose, "Outbound: dropped unencodable packet", &e);
                    continue;
                }
            };
            match conn.write_binary(&payload).await {
                Ok(()) => self.stats.record_written(n),
                Err(e) => report(self.verbose, "Outbound: write failed", &e),
            }
        }
        debug!("Outbound forwarder stopped");
    }

    /// Transport → interface for one connection
    pub async fn ws_to_tun(self, conn: SharedConnection) {
        loop {
            let payload = match conn.read_message().await {
                Ok(Message::Binary(payload)) => payload,
                Ok(Message::Text(_)) => continue,
                Err(e) => {
                    report(self.verbose, "Inbound: read failed", &e);
                    break;
                }
            };

            let packet = match self.pipeline.decode(payload) {
                Ok(packet) => packet,
                Err(e) => {
                    report(self.verbose, "Inbound: dropped undecodable payload", &e);
                    continue;
                }
            };
            if packet.is_empty() {
                trace!("Inbound: dropped empty packet");
                continue;
            }

            if let Err(e) = self.device.write_packet(&packet).await {
                report(self.verbose, "Inbound: write to interface failed", &e);
                break;
            }
            self.stats.record_read(packet.len());
        }
        debug!("Inbound forwarder stopped");
    }
}
