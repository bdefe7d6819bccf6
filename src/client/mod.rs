//! Client Layer
//!
//! - Forwarder: the two packet loops between interface and connection
//! - Runner: reconnect, keepalive and connection publishing

mod forwarder;
mod runner;

pub use forwarder::Forwarder;
pub use runner::{Client, SessionState, SessionTiming, KEEPALIVE_MESSAGE};
