//! Registry - process-wide key/value slots with expiry
//!
//! The session runner publishes the live transport connection here and the
//! outbound forwarder looks it up on every packet. The runner is the only
//! writer; readers never block on a writer and never mutate an entry.
//!
//! Expiry is a safety net. Entries are normally removed by an explicit
//! [`Registry::delete`] when a session ends.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

/// Registry key under which the live transport connection is published
pub const CONNECTION_KEY: &str = "wsconn";

/// Expiry applied to the published connection
pub const CONNECTION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A stored value with its expiry instant
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Time-expiring key/value store
pub struct Registry<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> Registry<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store `value` under `key`, replacing any previous entry
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .insert(key.to_string(), Entry { value, expires_at });
        trace!("Registry: set {} (ttl {:?})", key, ttl);
    }

    /// Look up `key`; absent and expired entries both return `None`
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Remove `key`, returning whether a live entry was present
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.entries.write().remove(key);
        trace!("Registry: delete {}", key);
        removed.map_or(false, |entry| !entry.is_expired(Instant::now()))
    }
}

impl<V: Clone> Default for Registry<V> {
    fn default() -> Self {
        Self::new()
    }
}
