//! Traffic statistics and the Prometheus metrics HTTP endpoint
//!
//! Provides /metrics endpoint for Prometheus scraping.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{http::header::CONTENT_TYPE, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::metrics::{
    format_bytes, init_metrics, DIAL_ATTEMPTS, DIAL_FAILURES, PACKETS_DROPPED, REGISTRY,
    SESSIONS_TOTAL, TUN_BYTES_READ, TUN_BYTES_WRITTEN,
};

/// Byte and session counters shared by the forwarders and the session runner
///
/// Every update goes to the Prometheus counters as well as to local totals,
/// so a handle can report its own traffic without scraping the registry.
#[derive(Debug, Default)]
pub struct TrafficStats {
    read_bytes: AtomicU64,
    written_bytes: AtomicU64,
    dropped_packets: AtomicU64,
    dial_attempts: AtomicU64,
    dial_failures: AtomicU64,
    sessions: AtomicU64,
}

impl TrafficStats {
    pub fn new() -> Arc<Self> {
        init_metrics();
        Arc::new(Self::default())
    }

    /// Transport → interface
    pub fn record_read(&self, bytes: usize) {
        self.read_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        TUN_BYTES_READ.inc_by(bytes as u64);
    }

    /// Interface → transport
    pub fn record_written(&self, bytes: usize) {
        self.written_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        TUN_BYTES_WRITTEN.inc_by(bytes as u64);
    }

    pub fn record_dropped(&self) {
        self.dropped_packets.fetch_add(1, Ordering::Relaxed);
        PACKETS_DROPPED.inc();
    }

    pub fn dial_started(&self) {
        self.dial_attempts.fetch_add(1, Ordering::Relaxed);
        DIAL_ATTEMPTS.inc();
    }

    pub fn dial_failed(&self) {
        self.dial_failures.fetch_add(1, Ordering::Relaxed);
        DIAL_FAILURES.inc();
    }

    pub fn session_started(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
        SESSIONS_TOTAL.inc();
    }

    pub fn read_bytes(&self) -> u64 {
        self.read_bytes.load(Ordering::Relaxed)
    }

    pub fn written_bytes(&self) -> u64 {
        self.written_bytes.load(Ordering::Relaxed)
    }

    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets.load(Ordering::Relaxed)
    }

    pub fn dial_attempts(&self) -> u64 {
        self.dial_attempts.load(Ordering::Relaxed)
    }

    pub fn dial_failures(&self) -> u64 {
        self.dial_failures.load(Ordering::Relaxed)
    }

    pub fn sessions(&self) -> u64 {
        self.sessions.load(Ordering::Relaxed)
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        format!(
            "read {} / written {} ({} sessions, {} packets dropped)",
            format_bytes(self.read_bytes()),
            format_bytes(self.written_bytes()),
            self.sessions(),
            self.dropped_packets()
        )
    }
}

/// Prometheus metrics endpoint
async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).into_response();
    }

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Build the API router (metrics only)
pub fn build_api_router() -> Router {
    Router::new().route("/metrics", get(get_metrics))
}

/// Start the metrics server
pub async fn start_api_server(addr: SocketAddr, mut shutdown_rx: broadcast::Receiver<()>) {
    init_metrics();
    let app = build_api_router();

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!("Failed to bind metrics server to {}: {}", addr, e);
            return;
        }
    };

    info!("Prometheus metrics server listening on http://{}/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Metrics server shutting down");
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Metrics server error: {}", e);
        });
}
