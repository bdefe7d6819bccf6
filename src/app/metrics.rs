//! Prometheus-based metrics module
//!
//! Counters live in a process-wide registry and are exposed via the
//! `/metrics` endpoint when the stats API is enabled.

use lazy_static::lazy_static;
use prometheus::{IntCounter, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // === Traffic Metrics ===

    /// Bytes received from the transport and written into the interface
    pub static ref TUN_BYTES_READ: IntCounter = IntCounter::new(
        "wstun_tun_bytes_read_total",
        "Total bytes received from the tunnel server"
    ).unwrap();

    /// Bytes read from the interface and sent to the transport
    pub static ref TUN_BYTES_WRITTEN: IntCounter = IntCounter::new(
        "wstun_tun_bytes_written_total",
        "Total bytes sent to the tunnel server"
    ).unwrap();

    /// Outbound packets discarded while no connection was live
    pub static ref PACKETS_DROPPED: IntCounter = IntCounter::new(
        "wstun_packets_dropped_total",
        "Total outbound packets dropped with no live connection"
    ).unwrap();

    // === Session Metrics ===

    pub static ref DIAL_ATTEMPTS: IntCounter = IntCounter::new(
        "wstun_dial_attempts_total",
        "Total number of dial attempts"
    ).unwrap();

    pub static ref DIAL_FAILURES: IntCounter = IntCounter::new(
        "wstun_dial_failures_total",
        "Total number of failed dial attempts"
    ).unwrap();

    /// Sessions that reached the connected state
    pub static ref SESSIONS_TOTAL: IntCounter = IntCounter::new(
        "wstun_sessions_total",
        "Total number of established sessions"
    ).unwrap();
}

/// Initialize and register all metrics with the global registry
pub fn init_metrics() {
    REGISTRY.register(Box::new(TUN_BYTES_READ.clone())).ok();
    REGISTRY.register(Box::new(TUN_BYTES_WRITTEN.clone())).ok();
    REGISTRY.register(Box::new(PACKETS_DROPPED.clone())).ok();

    REGISTRY.register(Box::new(DIAL_ATTEMPTS.clone())).ok();
    REGISTRY.register(Box::new(DIAL_FAILURES.clone())).ok();
    REGISTRY.register(Box::new(SESSIONS_TOTAL.clone())).ok();
}

/// Format bytes to human readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;
    const TB: u64 = 1024 * 1024 * 1024 * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_registered_metric_names() {
        init_metrics();
        init_metrics();
        let names: Vec<String> = REGISTRY
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"wstun_tun_bytes_read_total".to_string()));
        assert!(names.contains(&"wstun_sessions_total".to_string()));
    }
}
