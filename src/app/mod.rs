//! Application Layer
//!
//! This module contains:
//! - Metrics: Prometheus counters for traffic and sessions
//! - StatsApi: traffic statistics handle and the HTTP /metrics endpoint

pub mod metrics;
pub mod stats_api;

pub use metrics::format_bytes;
pub use stats_api::{start_api_server, TrafficStats};
